use super::name::Utf8Policy;

/// Archive-wide settings shared by the encoder and the length predictor.
///
/// Both sides must see the same options for their byte counts to agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// UTF-8 flag handling for raw byte names
    pub utf8_policy: Utf8Policy,
    /// Use Zip64 records where classic fields overflow; when disabled, overflow is an error
    pub allow_zip64: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            utf8_policy: Utf8Policy::Auto,
            allow_zip64: true,
        }
    }
}
