/// Handle for rows written during one rebuild and not yet visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildStaging {
    /// Rebuild run identifier.
    pub run_id: String,
    /// Storage location holding the staged rows.
    pub table_name: String,
}
