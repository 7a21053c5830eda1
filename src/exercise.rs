//! Exercise catalog

use serde::Serialize;

/// Which form coach watches an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachKind {
    /// Knee-angle rep machine + back monitor
    Squat,
    /// Shown with tips only
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct Exercise {
    pub id: &'static str,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub muscle_groups: &'static [&'static str],
    pub tips: &'static [&'static str],
    pub gif: &'static str,
    pub demo_gif: Option<&'static str>,
    pub coach: CoachKind,
}

impl Exercise {
    pub fn is_coached(&self) -> bool {
        self.coach != CoachKind::None
    }

    fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }
}

pub const EXERCISES: &[Exercise] = &[
    Exercise {
        id: "squat_bw",
        name: "Bodyweight Squat",
        aliases: &["سكوات", "Squat", "Bodyweight Squat"],
        muscle_groups: &["thighs", "quads", "glutes"],
        tips: &["ثبّت الكعبين", "ادفع الوركين للخلف", "ظهر محايد", "انزل ببطء واصعد بتحكم"],
        gif: "/gifs/squat.gif",
        demo_gif: Some("/gifs/squat.gif"),
        coach: CoachKind::Squat,
    },
    Exercise {
        id: "glute_bridge",
        name: "Glute Bridge",
        aliases: &["جسر الألوية", "Bridge"],
        muscle_groups: &["glutes", "hamstrings"],
        tips: &["اضغط بالكعبين", "ارفع الحوض حتى استقامة الجذع", "لا تقوّس أسفل الظهر"],
        gif: "/gifs/glute_bridge.gif",
        demo_gif: None,
        coach: CoachKind::None,
    },
    Exercise {
        id: "lunge",
        name: "Lunge",
        aliases: &["طعنة", "Forward Lunge"],
        muscle_groups: &["thighs", "quads", "glutes"],
        tips: &["الركبة فوق الكاحل", "الجذع مستقيم", "انزل حتى تقارب الركبة الخلفية الأرض"],
        gif: "/gifs/lunge.gif",
        demo_gif: None,
        coach: CoachKind::None,
    },
];

/// Lowercase, drop whitespace, fold ى→ي and ة→ه
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'ى' => 'ي',
            'ة' => 'ه',
            other => other,
        })
        .collect()
}

pub fn all() -> &'static [Exercise] {
    EXERCISES
}

pub fn find_by_id(id: &str) -> Option<&'static Exercise> {
    EXERCISES.iter().find(|e| e.id == id)
}

/// Exact normalized match on name or alias first, then containment either way
pub fn find_by_name(name: &str) -> Option<&'static Exercise> {
    let key = normalize(name);
    if key.is_empty() {
        return None;
    }
    EXERCISES
        .iter()
        .find(|e| e.names().any(|n| normalize(n) == key))
        .or_else(|| {
            EXERCISES.iter().find(|e| {
                e.names().map(normalize).any(|n| key.contains(&n) || n.contains(&key))
            })
        })
}

pub fn by_muscle(muscle: &str) -> Vec<&'static Exercise> {
    let m = muscle.to_lowercase();
    EXERCISES
        .iter()
        .filter(|e| e.muscle_groups.iter().any(|g| g.to_lowercase() == m))
        .collect()
}
