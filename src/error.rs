use std::fmt;

/// Which table an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    Player,
    Team,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKind::Player => f.write_str("player"),
            IdentityKind::Team => f.write_str("team"),
        }
    }
}

/// One identifier that maps to two different display names inside a
/// single competition/season scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameConflict {
    pub kind: IdentityKind,
    pub competition: String,
    pub season: String,
    pub id: String,
    pub first: String,
    pub second: String,
}

impl fmt::Display for NameConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} in {} {} is named both {:?} and {:?}",
            self.kind, self.id, self.competition, self.season, self.first, self.second
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    /// Identifiers with more than one display name.
    #[error("{} name conflict(s), first: {}", .0.len(), first_conflict(.0))]
    NameConflicts(Vec<NameConflict>),

    /// A file extension the store cannot read.
    #[error("unsupported dataset format: {0}")]
    UnsupportedFormat(String),

    /// A required column is absent from a tabular source.
    #[error("missing column {column} in {table}")]
    MissingColumn { table: String, column: String },

    /// A required cell that is null, empty, unparseable or out of range.
    #[error("invalid {column} in {table}: {detail}")]
    InvalidCell {
        table: String,
        column: String,
        detail: String,
    },
}

fn first_conflict(conflicts: &[NameConflict]) -> String {
    conflicts
        .first()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string())
}
