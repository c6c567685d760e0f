use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ProcedureKind {
    Consultation => "consultation",
    Exam => "exam",
    Surgery => "surgery",
});

str_enum!(ProcedureStatus {
    Pending => "pending",
    Scheduled => "scheduled",
    Won => "won",
    Lost => "lost",
});

str_enum!(UserRole {
    Admin => "admin",
    Manager => "manager",
    Consultant => "consultant",
});

str_enum!(ConnectionStatus {
    Open => "open",
    Connecting => "connecting",
    Close => "close",
    Unknown => "unknown",
});

impl ConnectionStatus {
    /// Gateway states outside the known set collapse to `Unknown`.
    pub fn from_gateway_state(raw: &str) -> Self {
        raw.trim()
            .to_ascii_lowercase()
            .parse()
            .unwrap_or(Self::Unknown)
    }
}
