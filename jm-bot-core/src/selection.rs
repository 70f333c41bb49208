use std::fmt;

/// Which chapter of an album a command will download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSelection {
    /// 1-based chapter index.
    pub index: usize,
    pub notice: Option<SelectionNotice>,
}

/// Message to surface in chat about how the chapter was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionNotice {
    /// Single-chapter album; the requested index was ignored.
    SingleChapterIgnored { requested: u32 },
    /// Multi-chapter album without a requested index.
    FirstOfMany { available: usize },
    /// Multi-chapter album, requested index is valid.
    Selected { index: usize, available: usize },
    /// Requested index outside `[1, available]`; fell back to chapter 1.
    OutOfRange { requested: u32, available: usize },
}

impl SelectionNotice {
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SelectionNotice::OutOfRange { .. } | SelectionNotice::SingleChapterIgnored { .. }
        )
    }
}

impl fmt::Display for SelectionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionNotice::SingleChapterIgnored { requested } => write!(
                f,
                "Single-chapter album, ignoring chapter {requested}"
            ),
            SelectionNotice::FirstOfMany { available } => write!(
                f,
                "Album has {available} chapters, downloading chapter 1 only"
            ),
            SelectionNotice::Selected { index, available } => write!(
                f,
                "Album has {available} chapters, downloading chapter {index}"
            ),
            SelectionNotice::OutOfRange {
                requested,
                available,
            } => write!(
                f,
                "Album only has {available} chapters, chapter {requested} does not exist; downloading chapter 1"
            ),
        }
    }
}

/// Picks the chapter to download. `available` must be at least 1.
pub fn select_chapter(available: usize, requested: Option<u32>) -> ChapterSelection {
    if available <= 1 {
        return ChapterSelection {
            index: 1,
            notice: requested.map(|requested| SelectionNotice::SingleChapterIgnored { requested }),
        };
    }

    match requested {
        None => ChapterSelection {
            index: 1,
            notice: Some(SelectionNotice::FirstOfMany { available }),
        },
        Some(n) if n >= 1 && (n as usize) <= available => ChapterSelection {
            index: n as usize,
            notice: Some(SelectionNotice::Selected {
                index: n as usize,
                available,
            }),
        },
        Some(requested) => {
            tracing::warn!(requested, available, "Requested chapter out of range, falling back to chapter 1");
            ChapterSelection {
                index: 1,
                notice: Some(SelectionNotice::OutOfRange {
                    requested,
                    available,
                }),
            }
        }
    }
}
