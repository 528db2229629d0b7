use super::binarize::BinaryImage;
use super::geometry::{cross, Point};

// Finder candidates
//------------------------------------------------------------------------------

/// One clustered finder-pattern sighting: refined center, estimated module
/// size and the number of scanlines that voted for it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FinderCandidate {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub count: u32,
}

impl FinderCandidate {
    fn center(&self) -> Point {
        Point { x: self.x, y: self.y }
    }
}

// Scanline search
//------------------------------------------------------------------------------

/// Scans every row for dark/light run sequences in the 1:1:3:1:1 finder
/// ratio, refines each hit and clusters nearby hits together.
pub(crate) fn locate_finders(img: &BinaryImage) -> Vec<FinderCandidate> {
    let mut candidates: Vec<FinderCandidate> = Vec::new();

    for y in 0..img.h as i32 {
        let runs = row_runs(img, y);
        for window in runs.windows(5) {
            // RLE alternates colors, so a dark first run fixes the sequence
            if !window[0].dark {
                continue;
            }
            let lens = [window[0].len, window[1].len, window[2].len, window[3].len, window[4].len];
            if !is_finder_ratio(&lens) {
                continue;
            }
            let stone_mid = window[2].start + window[2].len as i32 / 2;
            if let Some(candidate) = refine_candidate(img, stone_mid, y) {
                merge_candidate(&mut candidates, candidate);
            }
        }
    }

    candidates
}

#[derive(Debug, Clone, Copy)]
struct Run {
    dark: bool,
    start: i32,
    len: u32,
}

fn row_runs(img: &BinaryImage, y: i32) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for x in 0..img.w as i32 {
        let dark = img.dark(x, y);
        match runs.last_mut() {
            Some(run) if run.dark == dark => run.len += 1,
            _ => runs.push(Run { dark, start: x, len: 1 }),
        }
    }
    runs
}

// Each run must sit within half a module of its expected share, the total
// being seven modules wide.
fn is_finder_ratio(lens: &[u32; 5]) -> bool {
    let unit = lens.iter().sum::<u32>() as f64 / 7.0;
    if unit < 1.0 {
        return false;
    }
    let expected = [1.0, 1.0, 3.0, 1.0, 1.0];
    lens.iter()
        .zip(expected.iter())
        .all(|(&len, &e)| (len as f64 - e * unit).abs() <= unit * 0.5 + 0.5)
}

// Refinement and clustering
//------------------------------------------------------------------------------

// Measures the central dark stone horizontally at the hit row and vertically
// at the refined center column. The candidate center is the midpoint of both
// extents; the module size is (width + height) / 6 since the stone is three
// modules square.
fn refine_candidate(img: &BinaryImage, x: i32, y: i32) -> Option<FinderCandidate> {
    if !img.dark(x, y) {
        return None;
    }

    let limit = img.w.max(img.h);
    let left = x - run_len(img, x - 1, y, -1, 0, true, limit) as i32;
    let right = x + run_len(img, x + 1, y, 1, 0, true, limit) as i32;
    let cx = (left + right) as f64 / 2.0;

    let cxi = cx.round() as i32;
    let top = y - run_len(img, cxi, y - 1, 0, -1, true, limit) as i32;
    let bottom = y + run_len(img, cxi, y + 1, 0, 1, true, limit) as i32;
    let cy = (top + bottom) as f64 / 2.0;

    let width = (right - left + 1) as f64;
    let height = (bottom - top + 1) as f64;
    if height < width * 0.5 || height > width * 2.0 {
        return None;
    }

    let size = (width + height) / 6.0;
    if !cross_check_vertical(img, cxi, top, bottom, size) {
        return None;
    }

    Some(FinderCandidate { x: cx, y: cy, size, count: 1 })
}

fn run_len(img: &BinaryImage, x: i32, y: i32, dx: i32, dy: i32, dark: bool, limit: u32) -> u32 {
    let (mut x, mut y) = (x, y);
    let mut len = 0;
    while len < limit && img.dark(x, y) == dark {
        x += dx;
        y += dy;
        len += 1;
    }
    len
}

// Confirms the ring structure above and below the stone: one module of
// light, then one module of dark, in both directions.
fn cross_check_vertical(img: &BinaryImage, cx: i32, top: i32, bottom: i32, size: f64) -> bool {
    let limit = (size * 4.0) as u32 + 2;
    let lo = (size * 0.3).floor() as u32;
    let hi = (size * 2.0).ceil() as u32;
    let within = |len: u32| len >= lo.max(1) && len <= hi;

    let light_up = run_len(img, cx, top - 1, 0, -1, false, limit);
    let dark_up = run_len(img, cx, top - 1 - light_up as i32, 0, -1, true, limit);
    let light_down = run_len(img, cx, bottom + 1, 0, 1, false, limit);
    let dark_down = run_len(img, cx, bottom + 1 + light_down as i32, 0, 1, true, limit);

    within(light_up) && within(dark_up) && within(light_down) && within(dark_down)
}

// Hits whose centers fall within three module sizes of an existing candidate
// are averaged into it, weighted by vote count.
fn merge_candidate(candidates: &mut Vec<FinderCandidate>, hit: FinderCandidate) {
    for c in candidates.iter_mut() {
        let dist = ((c.x - hit.x).powi(2) + (c.y - hit.y).powi(2)).sqrt();
        if dist <= c.size * 3.0 {
            let n = c.count as f64;
            c.x = (c.x * n + hit.x) / (n + 1.0);
            c.y = (c.y * n + hit.y) / (n + 1.0);
            c.size = (c.size * n + hit.size) / (n + 1.0);
            c.count += 1;
            return;
        }
    }
    candidates.push(hit);
}

// Pattern ordering
//------------------------------------------------------------------------------

/// Picks the three strongest candidates and orders them [TL, TR, BL]: the
/// top-left corner is the vertex whose edges to the other two are most
/// nearly perpendicular and equal in length; handedness is fixed by the
/// cross product of the two edges. Also returns the average module size.
pub(crate) fn order_finders(mut candidates: Vec<FinderCandidate>) -> Option<([Point; 3], f64)> {
    if candidates.len() < 3 {
        return None;
    }
    candidates.sort_unstable_by(|a, b| b.count.cmp(&a.count));
    candidates.truncate(3);

    let pts: Vec<Point> = candidates.iter().map(|c| c.center()).collect();
    let module_size = candidates.iter().map(|c| c.size).sum::<f64>() / 3.0;

    let mut tl_index = 0;
    let mut best_score = f64::MAX;
    for i in 0..3 {
        let o = &pts[i];
        let a = &pts[(i + 1) % 3];
        let b = &pts[(i + 2) % 3];
        let (da, db) = (o.dist(a), o.dist(b));
        if da == 0.0 || db == 0.0 {
            return None;
        }
        let dot = (a.x - o.x) * (b.x - o.x) + (a.y - o.y) * (b.y - o.y);
        let score = (dot / (da * db)).abs() + (da - db).abs() / da.max(db);
        if score < best_score {
            best_score = score;
            tl_index = i;
        }
    }

    let tl = pts[tl_index];
    let p1 = pts[(tl_index + 1) % 3];
    let p2 = pts[(tl_index + 2) % 3];

    // The larger projection along the x axis becomes top-right
    let (mut tr, mut bl) = if p1.x - tl.x >= p2.x - tl.x { (p1, p2) } else { (p2, p1) };

    // TL->TR crossed with TL->BL must be positive in y-down coordinates
    if cross(&tl, &tr, &bl) < 0.0 {
        std::mem::swap(&mut tr, &mut bl);
    }

    Some(([tl, tr, bl], module_size))
}
