//! Muscle lookup from a circle drawn on the front/back body picture.
//!
//! Muscles are axis-aligned boxes in normalized image coordinates. A
//! selection is rasterized against an 800×1200 label map; pixels inside the
//! circle vote for their muscle with a Gaussian weight toward the centre.
//! When the circle touches no muscle, the nearest box centres are used.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub const LABEL_WIDTH: usize = 800;
pub const LABEL_HEIGHT: usize = 1200;

const TOP_K: usize = 5;
const MIN_PIXELS: usize = 3;
const SIGMA_SCALE: f64 = 0.25;
const MIN_SIGMA: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodySide {
    Front,
    Back,
}

impl std::str::FromStr for BodySide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" => Ok(Self::Front),
            "back" => Ok(Self::Back),
            other => Err(format!("unknown body side '{}' (front|back)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MuscleBox {
    pub id: i32,
    pub name_en: &'static str,
    pub name_ar: &'static str,
    pub region: &'static str,
    /// x1, y1, x2, y2 in [0, 1]
    pub box_norm: [f64; 4],
}

impl MuscleBox {
    fn centre_px(&self) -> (f64, f64) {
        let [x1, y1, x2, y2] = self.box_norm;
        (
            (x1 + x2) / 2.0 * LABEL_WIDTH as f64,
            (y1 + y2) / 2.0 * LABEL_HEIGHT as f64,
        )
    }
}

/// Normalized selection circle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleHit {
    pub id: i32,
    pub prob: f64,
    pub muscle_ar: String,
    pub muscle_en: String,
    pub region: String,
}

impl MuscleHit {
    fn from_box(item: &MuscleBox, prob: f64) -> Self {
        Self {
            id: item.id,
            prob: round4(prob),
            muscle_ar: item.name_ar.to_string(),
            muscle_en: item.name_en.to_string(),
            region: item.region.to_string(),
        }
    }

    fn unspecified() -> Self {
        Self {
            id: -1,
            prob: 1.0,
            muscle_ar: "غير محدد".to_string(),
            muscle_en: "Unspecified".to_string(),
            region: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub results: Vec<MuscleHit>,
    #[serde(default)]
    pub region_hint: Option<String>,
    #[serde(default)]
    pub region_conf: Option<f64>,
    #[serde(default)]
    pub used_fallback: bool,
}

const BACK: &[MuscleBox] = &[
    MuscleBox { id: 101, name_en: "Trapezius (Upper/Middle)", name_ar: "شبه المنحرف (علوي/أوسط)", region: "Back-Upper", box_norm: [0.32, 0.1, 0.68, 0.28] },
    MuscleBox { id: 102, name_en: "Deltoid (Posterior) - Left", name_ar: "الدالية الخلفية - يسار", region: "Shoulder", box_norm: [0.15, 0.22, 0.32, 0.36] },
    MuscleBox { id: 103, name_en: "Deltoid (Posterior) - Right", name_ar: "الدالية الخلفية - يمين", region: "Shoulder", box_norm: [0.68, 0.22, 0.85, 0.36] },
    MuscleBox { id: 104, name_en: "Infraspinatus - Left", name_ar: "تحت الشوكة الكتفية - يسار", region: "Shoulder-Back", box_norm: [0.18, 0.32, 0.34, 0.44] },
    MuscleBox { id: 105, name_en: "Infraspinatus - Right", name_ar: "تحت الشوكة الكتفية - يمين", region: "Shoulder-Back", box_norm: [0.66, 0.32, 0.82, 0.44] },
    MuscleBox { id: 106, name_en: "Teres Major - Left", name_ar: "المدور الكبير - يسار", region: "Shoulder-Back", box_norm: [0.22, 0.42, 0.36, 0.5] },
    MuscleBox { id: 107, name_en: "Teres Major - Right", name_ar: "المدور الكبير - يمين", region: "Shoulder-Back", box_norm: [0.64, 0.42, 0.78, 0.5] },
    MuscleBox { id: 108, name_en: "Latissimus Dorsi - Left", name_ar: "الظهر العريضة - يسار", region: "Back", box_norm: [0.22, 0.5, 0.4, 0.7] },
    MuscleBox { id: 109, name_en: "Latissimus Dorsi - Right", name_ar: "الظهر العريضة - يمين", region: "Back", box_norm: [0.6, 0.5, 0.78, 0.7] },
    MuscleBox { id: 110, name_en: "Triceps (Long Head) - Left", name_ar: "ثلاثية الرؤوس (الرأس الطويل) - يسار", region: "Upper Arm", box_norm: [0.1, 0.42, 0.2, 0.62] },
    MuscleBox { id: 111, name_en: "Triceps (Long Head) - Right", name_ar: "ثلاثية الرؤوس (الرأس الطويل) - يمين", region: "Upper Arm", box_norm: [0.8, 0.42, 0.9, 0.62] },
    MuscleBox { id: 112, name_en: "Gluteus Maximus - Left", name_ar: "الألوية الكبرى - يسار", region: "Gluteal", box_norm: [0.28, 0.7, 0.44, 0.86] },
    MuscleBox { id: 113, name_en: "Gluteus Maximus - Right", name_ar: "الألوية الكبرى - يمين", region: "Gluteal", box_norm: [0.56, 0.7, 0.72, 0.86] },
    MuscleBox { id: 114, name_en: "Hamstrings - Left", name_ar: "أوتار الفخذ الخلفية - يسار", region: "Thigh-Back", box_norm: [0.32, 0.86, 0.42, 0.98] },
    MuscleBox { id: 115, name_en: "Hamstrings - Right", name_ar: "أوتار الفخذ الخلفية - يمين", region: "Thigh-Back", box_norm: [0.58, 0.86, 0.68, 0.98] },
    MuscleBox { id: 116, name_en: "Gastrocnemius - Left", name_ar: "بطة الساق - يسار", region: "Calf", box_norm: [0.36, 0.98, 0.42, 1.0] },
    MuscleBox { id: 117, name_en: "Gastrocnemius - Right", name_ar: "بطة الساق - يمين", region: "Calf", box_norm: [0.58, 0.98, 0.64, 1.0] },
];

const FRONT: &[MuscleBox] = &[
    MuscleBox { id: 201, name_en: "Sternocleidomastoid - Left", name_ar: "القصية الترقوية الخشائية - يسار", region: "Neck", box_norm: [0.42, 0.08, 0.48, 0.16] },
    MuscleBox { id: 202, name_en: "Sternocleidomastoid - Right", name_ar: "القصية الترقوية الخشائية - يمين", region: "Neck", box_norm: [0.52, 0.08, 0.58, 0.16] },
    MuscleBox { id: 203, name_en: "Deltoid (Anterior) - Left", name_ar: "الدالية الأمامية - يسار", region: "Shoulder", box_norm: [0.18, 0.24, 0.32, 0.36] },
    MuscleBox { id: 204, name_en: "Deltoid (Anterior) - Right", name_ar: "الدالية الأمامية - يمين", region: "Shoulder", box_norm: [0.68, 0.24, 0.82, 0.36] },
    MuscleBox { id: 205, name_en: "Pectoralis Major - Left", name_ar: "الصدري الكبير - يسار", region: "Chest", box_norm: [0.3, 0.28, 0.48, 0.42] },
    MuscleBox { id: 206, name_en: "Pectoralis Major - Right", name_ar: "الصدري الكبير - يمين", region: "Chest", box_norm: [0.52, 0.28, 0.7, 0.42] },
    MuscleBox { id: 207, name_en: "Biceps Brachii - Left", name_ar: "العضلة ذات الرأسين - يسار", region: "Upper Arm", box_norm: [0.14, 0.38, 0.24, 0.56] },
    MuscleBox { id: 208, name_en: "Biceps Brachii - Right", name_ar: "العضلة ذات الرأسين - يمين", region: "Upper Arm", box_norm: [0.76, 0.38, 0.86, 0.56] },
    MuscleBox { id: 209, name_en: "Rectus Abdominis", name_ar: "عضلات البطن المستقيمة", region: "Abdomen", box_norm: [0.43, 0.42, 0.57, 0.7] },
    MuscleBox { id: 210, name_en: "External Oblique - Left", name_ar: "المائلة الخارجية - يسار", region: "Abdomen-Side", box_norm: [0.32, 0.46, 0.42, 0.68] },
    MuscleBox { id: 211, name_en: "External Oblique - Right", name_ar: "المائلة الخارجية - يمين", region: "Abdomen-Side", box_norm: [0.58, 0.46, 0.68, 0.68] },
    MuscleBox { id: 212, name_en: "Quadriceps - Left", name_ar: "رباعية الرؤوس - يسار", region: "Thigh-Front", box_norm: [0.36, 0.7, 0.46, 0.96] },
    MuscleBox { id: 213, name_en: "Quadriceps - Right", name_ar: "رباعية الرؤوس - يمين", region: "Thigh-Front", box_norm: [0.54, 0.7, 0.64, 0.96] },
    MuscleBox { id: 214, name_en: "Tibialis Anterior - Left", name_ar: "الظنبوبية الأمامية - يسار", region: "Shin", box_norm: [0.4, 0.96, 0.46, 1.0] },
    MuscleBox { id: 215, name_en: "Tibialis Anterior - Right", name_ar: "الظنبوبية الأمامية - يمين", region: "Shin", box_norm: [0.54, 0.96, 0.6, 1.0] },
    MuscleBox { id: 216, name_en: "Forearm Flexors - Left", name_ar: "مثنيات الساعد - يسار", region: "Forearm", box_norm: [0.1, 0.56, 0.22, 0.72] },
    MuscleBox { id: 217, name_en: "Forearm Flexors - Right", name_ar: "مثنيات الساعد - يمين", region: "Forearm", box_norm: [0.78, 0.56, 0.9, 0.72] },
    MuscleBox { id: 218, name_en: "Sartorius - Left", name_ar: "الخياطية - يسار", region: "Thigh-Front", box_norm: [0.32, 0.7, 0.4, 0.96] },
    MuscleBox { id: 219, name_en: "Sartorius - Right", name_ar: "الخياطية - يمين", region: "Thigh-Front", box_norm: [0.6, 0.7, 0.68, 0.96] },
];

pub fn items(side: BodySide) -> &'static [MuscleBox] {
    match side {
        BodySide::Front => FRONT,
        BodySide::Back => BACK,
    }
}

pub fn find_muscle(id: i32) -> Option<&'static MuscleBox> {
    FRONT.iter().chain(BACK).find(|m| m.id == id)
}

fn rasterize(boxes: &[MuscleBox]) -> Array2<i32> {
    let mut map = Array2::<i32>::zeros((LABEL_HEIGHT, LABEL_WIDTH));
    for item in boxes {
        let [x1, y1, x2, y2] = item.box_norm;
        let x1 = ((x1 * LABEL_WIDTH as f64) as usize).min(LABEL_WIDTH);
        let x2 = ((x2 * LABEL_WIDTH as f64) as usize).min(LABEL_WIDTH);
        let y1 = ((y1 * LABEL_HEIGHT as f64) as usize).min(LABEL_HEIGHT);
        let y2 = ((y2 * LABEL_HEIGHT as f64) as usize).min(LABEL_HEIGHT);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }
        // later boxes win where they overlap
        map.slice_mut(ndarray::s![y1..y2, x1..x2]).fill(item.id);
    }
    map
}

/// Rasterized muscle ids, 0 for background. Built once per side.
pub fn label_map(side: BodySide) -> &'static Array2<i32> {
    static FRONT_MAP: OnceLock<Array2<i32>> = OnceLock::new();
    static BACK_MAP: OnceLock<Array2<i32>> = OnceLock::new();
    match side {
        BodySide::Front => FRONT_MAP.get_or_init(|| rasterize(FRONT)),
        BodySide::Back => BACK_MAP.get_or_init(|| rasterize(BACK)),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Vote {
    weight: f64,
    pixels: usize,
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() {
        lo
    } else {
        v.clamp(lo, hi)
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Gaussian-weighted votes of every muscle inside the circle (pixel units)
fn circle_votes(map: &Array2<i32>, cx: f64, cy: f64, radius: f64) -> Vec<(i32, Vote)> {
    let sigma = (SIGMA_SCALE * radius).max(MIN_SIGMA);
    let two_sigma_sq = 2.0 * sigma * sigma;
    let r_sq = radius * radius;

    let x0 = (cx - radius).floor().max(0.0) as usize;
    let y0 = (cy - radius).floor().max(0.0) as usize;
    let x1 = ((cx + radius).ceil().max(0.0) as usize).min(LABEL_WIDTH - 1);
    let y1 = ((cy + radius).ceil().max(0.0) as usize).min(LABEL_HEIGHT - 1);

    let mut votes: BTreeMap<i32, Vote> = BTreeMap::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            let d_sq = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
            if d_sq > r_sq {
                continue;
            }
            let id = map[[y, x]];
            if id <= 0 {
                continue;
            }
            let v = votes.entry(id).or_default();
            v.weight += (-d_sq / two_sigma_sq).exp();
            v.pixels += 1;
        }
    }

    let mut ranked: Vec<(i32, Vote)> = votes
        .into_iter()
        .filter(|(_, v)| v.pixels >= MIN_PIXELS && v.weight > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.1.weight.total_cmp(&a.1.weight));
    ranked.truncate(TOP_K);
    ranked
}

/// Region with the largest share of the vote weight
fn region_hint(ranked: &[(i32, Vote)]) -> Option<(String, f64)> {
    let mut scores: BTreeMap<&str, f64> = BTreeMap::new();
    let mut total = 0.0;
    for (id, vote) in ranked {
        let Some(meta) = find_muscle(*id) else {
            continue;
        };
        *scores.entry(meta.region).or_default() += vote.weight;
        total += vote.weight;
    }
    if total <= 0.0 {
        return None;
    }
    scores
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(region, score)| (region.to_string(), round4(score / total)))
}

/// Nearest box centres, weighted by inverse distance
fn nearest_centres(side: BodySide, cx: f64, cy: f64) -> Vec<MuscleHit> {
    let mut candidates: Vec<(f64, &MuscleBox)> = items(side)
        .iter()
        .map(|m| {
            let (mx, my) = m.centre_px();
            ((mx - cx).hypot(my - cy), m)
        })
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
    candidates.truncate(TOP_K);

    if candidates.is_empty() {
        return vec![MuscleHit::unspecified()];
    }
    let inv_sum: f64 = candidates.iter().map(|(d, _)| 1.0 / (d + 1e-6)).sum();
    candidates
        .iter()
        .map(|(d, m)| MuscleHit::from_box(m, (1.0 / (d + 1e-6)) / inv_sum))
        .collect()
}

/// Muscles under a selection circle. Centre is clamped to [0, 1], radius to
/// [0.01, 0.5] of the shorter label-map side.
pub fn analyze(side: BodySide, cx: f64, cy: f64, radius: f64) -> Analysis {
    let cx = clamp(cx, 0.0, 1.0) * LABEL_WIDTH as f64;
    let cy = clamp(cy, 0.0, 1.0) * LABEL_HEIGHT as f64;
    let radius = clamp(radius, 0.01, 0.5) * LABEL_WIDTH.min(LABEL_HEIGHT) as f64;

    let ranked = circle_votes(label_map(side), cx, cy, radius);
    let total: f64 = ranked.iter().map(|(_, v)| v.weight).sum();

    let mut results: Vec<MuscleHit> = ranked
        .iter()
        .filter_map(|(id, v)| find_muscle(*id).map(|m| MuscleHit::from_box(m, v.weight / total)))
        .collect();

    let used_fallback = results.is_empty();
    if used_fallback {
        tracing::debug!("selection at ({:.0}, {:.0}) hit no muscle, using nearest centres", cx, cy);
        results = nearest_centres(side, cx, cy);
    }

    let (region_hint, region_conf) = match region_hint(&ranked) {
        Some((hint, conf)) => (Some(hint), Some(conf)),
        None => (None, None),
    };

    Analysis {
        results,
        region_hint,
        region_conf,
        used_fallback,
    }
}

pub fn analyze_circle(side: BodySide, circle: &Circle) -> Analysis {
    analyze(side, circle.cx, circle.cy, circle.radius)
}
