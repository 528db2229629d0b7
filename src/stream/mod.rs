//! Packetized streaming on top of the symbol codec: framing, CRC-16
//! integrity, sequencing, retransmit requests and reassembly. Packets are
//! opaque bytes to the QR layer; the QR layer is an opaque transport to this
//! one.

mod packet;
mod receiver;
mod sender;

pub use packet::{create_nack, crc16, parse_nack, Packet, PacketFlags, HEADER_SIZE, PACKET_MAGIC};
pub use receiver::{Progress, Receipt, Receiver, RejectReason};
pub use sender::{PacketSink, Sender, SenderConfig};
