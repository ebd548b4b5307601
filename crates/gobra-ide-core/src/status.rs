//! What the editor shows about verification: a status line and per-member
//! decorations.

use gobra_ide_proto::{OverallResult, Range};
use serde::Serialize;

use crate::file_set::FileId;
use crate::outcome::VerificationOutcome;

pub const IDLE_TEXT: &str = "Hello from Gobra";
const PROGRESS_PREFIX: &str = "Verification of ";
const PROGRESS_SEGMENTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    White,
    Green,
    Orange,
    Red,
}

impl StatusColor {
    /// CSS color name used by editors.
    pub fn css(self) -> &'static str {
        match self {
            StatusColor::White => "white",
            StatusColor::Green => "lightgreen",
            StatusColor::Orange => "orange",
            StatusColor::Red => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub text: String,
    pub color: StatusColor,
}

impl Status {
    pub fn idle() -> Self {
        Self {
            text: IDLE_TEXT.to_string(),
            color: StatusColor::White,
        }
    }

    /// `Verification of a.gobra 40% ⚫⚫⚫⚫⚪⚪⚪⚪⚪⚪`
    pub fn progress(file: &FileId, percent: i64) -> Self {
        let percent = percent.clamp(0, 100);
        let done = (percent / 10) as usize;
        let bar = format!(
            "{}{}",
            "⚫".repeat(done),
            "⚪".repeat(PROGRESS_SEGMENTS - done)
        );
        Self {
            text: format!("{PROGRESS_PREFIX}{} {percent}% {bar}", file.file_name()),
            color: StatusColor::White,
        }
    }

    pub fn finished(result: &OverallResult) -> Self {
        let color = match VerificationOutcome::from_result(result) {
            VerificationOutcome::Success { partial: false } => StatusColor::Green,
            VerificationOutcome::Success { partial: true } => StatusColor::Orange,
            _ => StatusColor::Red,
        };
        Self {
            text: result.message.clone(),
            color,
        }
    }
}

/// Verified and failed member ranges of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberDecorations {
    pub uri: String,
    pub verified: Vec<Range>,
    pub failed: Vec<Range>,
}

impl MemberDecorations {
    /// Decorations for `file` from a result, skipping members whose outcome
    /// is unknown.
    pub fn for_file(result: &OverallResult, file: &FileId) -> Self {
        let mut decorations = Self {
            uri: file.as_str().to_string(),
            ..Self::default()
        };
        let members = result.members.iter().filter(|m| !m.is_unknown).filter(|m| {
            FileId::parse(&m.file_uri).is_ok_and(|member_file| &member_file == file)
        });
        for member in members {
            if member.success {
                decorations.verified.push(member.range);
            } else {
                decorations.failed.push(member.range);
            }
        }
        decorations
    }
}
