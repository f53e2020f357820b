use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::Config;

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("file type not allowed")]
	Unsupported,
	#[error("file is larger than {0} bytes")]
	TooLarge(usize),
	#[error("file is empty")]
	Empty,
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

/// Stores uploaded images on disk and hands out their public URLs.
///
/// The same size cap applies to every image, whether it is a profile picture
/// or a recipe photo.
#[derive(Debug, Clone)]
pub struct Uploads {
	dir: PathBuf,
	url_prefix: String,
	max_bytes: usize,
}

impl Uploads {
	pub fn new(dir: impl Into<PathBuf>, url_prefix: &str, max_bytes: usize) -> Self {
		Self {
			dir: dir.into(),
			url_prefix: url_prefix.trim_end_matches('/').to_owned(),
			max_bytes,
		}
	}

	pub fn from_config(config: &Config) -> Self {
		Self::new(
			&config.upload_dir,
			&config.upload_url_prefix,
			config.max_upload_bytes,
		)
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn max_bytes(&self) -> usize {
		self.max_bytes
	}

	/// Checks the name and size of an upload without writing it, returning the
	/// normalized extension.
	pub fn check(&self, original_name: &str, len: usize) -> Result<String, Error> {
		let extension = Path::new(original_name)
			.extension()
			.and_then(|ext| ext.to_str())
			.map(str::to_ascii_lowercase)
			.filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
			.ok_or(Error::Unsupported)?;

		if len == 0 {
			return Err(Error::Empty);
		}

		if len > self.max_bytes {
			return Err(Error::TooLarge(self.max_bytes));
		}

		Ok(extension)
	}

	/// Writes the image under a fresh name and returns its public URL.
	pub async fn store(&self, bytes: &[u8], original_name: &str) -> Result<String, Error> {
		let extension = self.check(original_name, bytes.len())?;
		let file_name = format!("{}.{extension}", Uuid::new_v4().simple());

		tokio::fs::create_dir_all(&self.dir).await?;
		tokio::fs::write(self.dir.join(&file_name), bytes).await?;

		tracing::debug!(file = %file_name, size = bytes.len(), "stored upload");

		Ok(format!("{}/{file_name}", self.url_prefix))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn uploads() -> Uploads {
		Uploads::new(std::env::temp_dir().join("recipe-server-test-uploads"), "/static/uploads/", 8)
	}

	#[test]
	fn test_check_extension_and_size() {
		let uploads = uploads();

		assert_eq!(uploads.check("Photo.JPG", 3).unwrap(), "jpg");
		assert!(matches!(uploads.check("notes.txt", 3), Err(Error::Unsupported)));
		assert!(matches!(uploads.check("noext", 3), Err(Error::Unsupported)));
		assert!(matches!(uploads.check("a.png", 9), Err(Error::TooLarge(8))));
		assert!(matches!(uploads.check("a.png", 0), Err(Error::Empty)));
	}

	#[tokio::test]
	async fn test_store_writes_file() {
		let uploads = uploads();
		let url = uploads.store(b"abc", "cake.webp").await.unwrap();

		assert!(url.starts_with("/static/uploads/"));
		assert!(url.ends_with(".webp"));

		let name = url.rsplit('/').next().unwrap();
		let written = tokio::fs::read(uploads.dir().join(name)).await.unwrap();

		assert_eq!(written, b"abc");
	}
}
