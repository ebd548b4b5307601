use std::fmt;

/// Why a verification was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Open,
    Save,
    Manual,
    EditChange,
}

impl TriggerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::Open => "open",
            TriggerKind::Save => "save",
            TriggerKind::Manual => "manual",
            TriggerKind::EditChange => "edit",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
