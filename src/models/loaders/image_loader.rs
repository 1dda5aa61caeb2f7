use std::path::{Path, PathBuf};

use phf::phf_map;
use tokio::fs;

use crate::error::{AppError, AppResult, FileError};

/// 支持的扩展名 -> MIME
static MIME_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "jpg" => "image/jpeg",
    "jpeg" => "image/jpeg",
    "png" => "image/png",
    "gif" => "image/gif",
    "webp" => "image/webp",
};

/// 已加载的题目图片
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl LoadedImage {
    /// 转换为 (identity, payload, payload_kind)
    pub fn into_input(self) -> (String, Vec<u8>, String) {
        (self.filename, self.bytes, self.mime_type)
    }
}

/// 根据扩展名获取 MIME；不支持的格式返回 None
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MIME_TYPES.get(ext.as_str()).copied()
}

/// 按文件头检查内容是否与声明的格式一致
pub fn looks_like_image(bytes: &[u8], mime_type: &str) -> bool {
    match mime_type {
        "image/jpeg" => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        "image/png" => bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
        "image/gif" => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        "image/webp" => bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
        _ => false,
    }
}

/// 从文件夹中加载所有题目图片（按文件名排序）
pub async fn load_all_images(folder_path: &str) -> AppResult<Vec<LoadedImage>> {
    let folder = PathBuf::from(folder_path);

    if !folder.is_dir() {
        return Err(AppError::File(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        }));
    }

    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?
    {
        let path = entry.path();
        if let Some(mime_type) = mime_type_for(&path) {
            candidates.push((path, mime_type));
        }
    }
    candidates.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));

    tracing::info!("📁 在 {} 中找到 {} 张图片", folder_path, candidates.len());

    let mut images = Vec::with_capacity(candidates.len());
    for (path, mime_type) in candidates {
        let filename = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("⚠️ 读取图片失败 {}: {}", path.display(), e);
                continue;
            }
        };

        if !looks_like_image(&bytes, mime_type) {
            tracing::warn!("⚠️ 无效图片，已跳过: {}", filename);
            continue;
        }

        tracing::info!("  ✓ {}", filename);
        images.push(LoadedImage {
            filename,
            bytes,
            mime_type: mime_type.to_string(),
        });
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_mime_type_lookup_is_case_insensitive() {
        assert_eq!(mime_type_for(Path::new("a.PNG")), Some("image/png"));
        assert_eq!(mime_type_for(Path::new("b.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_type_for(Path::new("c.webp")), Some("image/webp"));
        assert_eq!(mime_type_for(Path::new("notes.txt")), None);
        assert_eq!(mime_type_for(Path::new("README")), None);
    }

    #[test]
    fn test_magic_number_check() {
        assert!(looks_like_image(&PNG_HEADER, "image/png"));
        assert!(looks_like_image(&[0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg"));
        assert!(looks_like_image(b"GIF89a....", "image/gif"));
        assert!(looks_like_image(b"RIFF\0\0\0\0WEBPVP8 ", "image/webp"));
        assert!(!looks_like_image(b"hello", "image/png"));
        assert!(!looks_like_image(&PNG_HEADER, "image/jpeg"));
    }

    #[tokio::test]
    async fn test_load_all_images_sorts_and_filters() {
        let dir = std::env::temp_dir().join(format!("question_solver_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.png"), PNG_HEADER).unwrap();
        std::fs::write(dir.join("a.jpg"), [0xFF, 0xD8, 0xFF, 0xDB]).unwrap();
        std::fs::write(dir.join("broken.png"), b"not an image").unwrap();
        std::fs::write(dir.join("notes.txt"), b"skip me").unwrap();

        let images = load_all_images(dir.to_str().unwrap()).await.unwrap();
        let names: Vec<_> = images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
        assert_eq!(images[0].mime_type, "image/jpeg");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_missing_folder_is_an_error() {
        let err = load_all_images("/definitely/not/here").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::File(FileError::DirectoryNotFound { .. })
        ));
    }
}
