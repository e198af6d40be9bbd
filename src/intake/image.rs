use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use sha2::{Digest, Sha256};
use std::path::Path;

/// 画像ファイルの中身
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageData {
    /// MIMEは内容から判定する（判定できなければ拡張子）
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = detect_mime(&file_name, &bytes);
        Self {
            file_name,
            mime,
            bytes,
        }
    }

    pub fn with_mime(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// SHA-256（16進）
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// 一時ファイル用の拡張子
    pub fn extension(&self) -> String {
        if let Some(ext) = ImageFormat::from_mime_type(&self.mime)
            .and_then(|f| f.extensions_str().first().copied())
        {
            return ext.to_string();
        }
        Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "bin".to_string())
    }

    /// `data:` URI（表示用）
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// 内容 → 拡張子 の順でMIMEを判定
pub fn detect_mime(file_name: &str, bytes: &[u8]) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }

    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if let Some(format) = ImageFormat::from_extension(&ext) {
        return format.to_mime_type().to_string();
    }

    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

    #[test]
    fn test_mime_from_content() {
        // 拡張子より内容が優先
        let image = ImageData::new("scan.txt", PNG_MAGIC.to_vec());
        assert_eq!(image.mime, "image/png");
        assert!(image.is_image());
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(detect_mime("photo.JPG", b"dummy"), "image/jpeg");
        assert_eq!(detect_mime("bill.pdf", b"%PDF-1.4"), "application/pdf");
        assert_eq!(detect_mime("notes", b"hello"), "application/octet-stream");
    }

    #[test]
    fn test_data_uri() {
        let image = ImageData::with_mime("a.png", "image/png", b"abc".to_vec());
        assert_eq!(image.to_data_uri(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        let image = ImageData::with_mime("a.png", "image/png", b"abc".to_vec());
        assert_eq!(
            image.digest(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_extension() {
        let jpeg = ImageData::with_mime("x", "image/jpeg", vec![1]);
        assert_eq!(jpeg.extension(), "jpg");
        let unknown = ImageData::with_mime("scan.heic", "application/octet-stream", vec![1]);
        assert_eq!(unknown.extension(), "heic");
    }
}
