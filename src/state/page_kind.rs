use serde::{Deserialize, Serialize};

/// Classification of a page within its crawl unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// The seed URL of the site
    Seed,

    /// A same-origin page reached from the seed
    Discovered,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Discovered => "discovered",
        }
    }
}
