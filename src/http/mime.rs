/// MIME types the server can announce and recognise.
///
/// The discriminant order is the lookup order: a `Content-Type` value is
/// matched against each entry's string by prefix, first hit wins, and
/// anything unrecognised falls through to [`MimeType::All`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MimeType {
    Tlv8,
    AppleBinaryPlist,
    ProxyAutoconfig,
    OctetStream,
    Javascript,
    Json,
    HapJson,
    HapPairing,
    HapVerify,
    TextHtml,
    TextPlain,
    EventStream,
    TextCss,
    ImagePng,
    ImageGif,
    ImageIcon,
    /// `*/*`
    #[default]
    All,
}

const TABLE: [MimeType; 17] = [
    MimeType::Tlv8,
    MimeType::AppleBinaryPlist,
    MimeType::ProxyAutoconfig,
    MimeType::OctetStream,
    MimeType::Javascript,
    MimeType::Json,
    MimeType::HapJson,
    MimeType::HapPairing,
    MimeType::HapVerify,
    MimeType::TextHtml,
    MimeType::TextPlain,
    MimeType::EventStream,
    MimeType::TextCss,
    MimeType::ImagePng,
    MimeType::ImageGif,
    MimeType::ImageIcon,
    MimeType::All,
];

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Tlv8 => "application/x-tlv8",
            MimeType::AppleBinaryPlist => "application/x-apple-binary-plist",
            MimeType::ProxyAutoconfig => "application/x-ns-proxy-autoconfig",
            MimeType::OctetStream => "application/octet-stream",
            MimeType::Javascript => "application/javascript",
            MimeType::Json => "application/json",
            MimeType::HapJson => "application/hap+json",
            MimeType::HapPairing => "application/pairing+tlv8",
            MimeType::HapVerify => "application/hap+verify",
            MimeType::TextHtml => "text/html",
            MimeType::TextPlain => "text/plain",
            MimeType::EventStream => "text/event-stream",
            MimeType::TextCss => "text/css",
            MimeType::ImagePng => "image/png",
            MimeType::ImageGif => "image/gif",
            MimeType::ImageIcon => "image/vnd.microsoft.icon",
            MimeType::All => "*/*",
        }
    }

    /// Classifies the bytes at the start of a `Content-Type` value.
    ///
    /// Trailing parameters are ignored because only the table entry has to
    /// be a prefix of `value`.
    ///
    /// # Example
    ///
    /// ```
    /// # use kiln::http::mime::MimeType;
    /// assert_eq!(MimeType::from_prefix(b"application/json; charset=utf-8"), MimeType::Json);
    /// assert_eq!(MimeType::from_prefix(b"video/mp4"), MimeType::All);
    /// ```
    pub fn from_prefix(value: &[u8]) -> MimeType {
        TABLE
            .iter()
            .copied()
            .find(|mime| value.starts_with(mime.as_str().as_bytes()))
            .unwrap_or(MimeType::All)
    }

    /// Maps a registration string to a table entry.
    pub fn parse(value: &str) -> MimeType {
        Self::from_prefix(value.as_bytes())
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
