use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;
const IMAGES_HEADER_LEN: usize = 16;
const LABELS_HEADER_LEN: usize = 8;

pub const CLASSES: usize = 10;

/// Which half of the corpus to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn images_file(self) -> &'static str {
        match self {
            Split::Train => "train-images-idx3-ubyte",
            Split::Test => "t10k-images-idx3-ubyte",
        }
    }

    pub fn labels_file(self) -> &'static str {
        match self {
            Split::Train => "train-labels-idx1-ubyte",
            Split::Test => "t10k-labels-idx1-ubyte",
        }
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or_else(|| Error::Corpus(format!("header truncated at byte {}", offset)))
}

fn check_magic(bytes: &[u8], expected: u32) -> Result<()> {
    let magic = read_u32(bytes, 0)?;
    if magic != expected {
        return Err(Error::Corpus(format!(
            "magic number {} where {} was expected",
            magic, expected
        )));
    }

    Ok(())
}

fn body(bytes: &[u8], header_len: usize, len: usize) -> Result<&[u8]> {
    let end = header_len
        .checked_add(len)
        .ok_or_else(|| Error::Corpus(format!("data length {} overflows", len)))?;

    bytes
        .get(header_len..end)
        .ok_or_else(|| {
            Error::Corpus(format!(
                "expected {} bytes of data, found {}",
                len,
                bytes.len().saturating_sub(header_len)
            ))
        })
}

/// Decodes an IDX image file. Pixels are returned raw, in `[0, 255]`, one
/// row-major vector per image.
pub fn parse_images(bytes: &[u8]) -> Result<Vec<Vec<f64>>> {
    check_magic(bytes, IMAGES_MAGIC)?;

    let count = read_u32(bytes, 4)? as usize;
    let rows = read_u32(bytes, 8)? as usize;
    let cols = read_u32(bytes, 12)? as usize;
    let (pixel_count, total) = rows
        .checked_mul(cols)
        .and_then(|pixel_count| Some((pixel_count, count.checked_mul(pixel_count)?)))
        .ok_or_else(|| {
            Error::Corpus(format!(
                "{} images of {}x{} pixels overflow the address space",
                count, rows, cols
            ))
        })?;

    let pixels = body(bytes, IMAGES_HEADER_LEN, total)?;
    if pixel_count == 0 {
        return Ok(vec![Vec::new(); count]);
    }

    Ok(pixels
        .chunks_exact(pixel_count)
        .map(|image| image.iter().map(|&p| p as f64).collect())
        .collect())
}

/// Decodes an IDX label file.
pub fn parse_labels(bytes: &[u8]) -> Result<Vec<u8>> {
    check_magic(bytes, LABELS_MAGIC)?;

    let count = read_u32(bytes, 4)? as usize;
    Ok(body(bytes, LABELS_HEADER_LEN, count)?.to_vec())
}

/// Reads a pair of IDX files from disk.
#[derive(Debug, Clone)]
pub struct MnistReader {
    images_path: PathBuf,
    labels_path: PathBuf,
}

impl MnistReader {
    pub fn new(images_path: impl AsRef<Path>, labels_path: impl AsRef<Path>) -> Self {
        MnistReader {
            images_path: images_path.as_ref().to_path_buf(),
            labels_path: labels_path.as_ref().to_path_buf(),
        }
    }

    /// The reader for the standard file names of `split` inside `folder`.
    pub fn in_folder(folder: impl AsRef<Path>, split: Split) -> Self {
        let folder = folder.as_ref();
        MnistReader::new(folder.join(split.images_file()), folder.join(split.labels_file()))
    }

    pub fn images(&self) -> Result<Vec<Vec<f64>>> {
        parse_images(&std::fs::read(&self.images_path)?)
    }

    pub fn labels(&self) -> Result<Vec<u8>> {
        parse_labels(&std::fs::read(&self.labels_path)?)
    }

    /// Images and labels together; fails if their counts disagree.
    pub fn read(&self) -> Result<(Vec<Vec<f64>>, Vec<u8>)> {
        let images = self.images()?;
        let labels = self.labels()?;

        if images.len() != labels.len() {
            return Err(Error::Corpus(format!(
                "{} images but {} labels",
                images.len(),
                labels.len()
            )));
        }

        info!(
            "Loaded {} MNIST samples from {}",
            images.len(),
            self.images_path.display()
        );

        Ok((images, labels))
    }
}

/// Downloads and unpacks the four corpus files into `folder` unless they are
/// all already present.
#[cfg(feature = "easy_datasets")]
pub fn download(folder: impl AsRef<Path>) -> Result<()> {
    const MNIST_BASE_URL: &str = "https://storage.googleapis.com/cvdf-datasets/mnist/";

    let folder = folder.as_ref();
    std::fs::create_dir_all(folder)?;

    for split in [Split::Train, Split::Test] {
        for file_name in [split.images_file(), split.labels_file()] {
            let destination = folder.join(file_name);
            if destination.exists() {
                continue;
            }

            let url = format!("{}{}.gz", MNIST_BASE_URL, file_name);
            info!("Downloading {}", url);
            super::utils::download_and_decompress(&url, &destination)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_images, parse_labels, MnistReader, Split};
    use crate::Error;

    fn header(magic: u32, dims: &[u32]) -> Vec<u8> {
        let mut bytes = magic.to_be_bytes().to_vec();
        for d in dims {
            bytes.extend_from_slice(&d.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn parses_images() {
        let mut bytes = header(2051, &[2, 2, 2]);
        bytes.extend_from_slice(&[0, 255, 3, 4, 5, 6, 7, 8]);

        let images = parse_images(&bytes).unwrap();

        assert_eq!(
            images,
            vec![vec![0.0, 255.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]
        );
    }

    #[test]
    fn parses_labels() {
        let mut bytes = header(2049, &[3]);
        bytes.extend_from_slice(&[7, 0, 9]);

        assert_eq!(parse_labels(&bytes).unwrap(), vec![7, 0, 9]);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut bytes = header(2049, &[1, 1, 1]);
        bytes.push(0);

        assert!(matches!(parse_images(&bytes), Err(Error::Corpus(_))));
        assert!(matches!(
            parse_labels(&header(2051, &[0])),
            Err(Error::Corpus(_))
        ));
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(matches!(parse_labels(&[0, 0, 8]), Err(Error::Corpus(_))));

        let mut bytes = header(2051, &[2, 2, 2]);
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(parse_images(&bytes), Err(Error::Corpus(_))));

        let mut bytes = header(2049, &[5]);
        bytes.extend_from_slice(&[1, 2]);
        assert!(matches!(parse_labels(&bytes), Err(Error::Corpus(_))));
    }

    #[test]
    fn rejects_oversized_headers() {
        let bytes = header(2051, &[u32::MAX, u32::MAX, u32::MAX]);

        assert!(matches!(parse_images(&bytes), Err(Error::Corpus(_))));
    }

    #[test]
    fn missing_files_are_io_errors() {
        let reader = MnistReader::in_folder("/nonexistent/mnist", Split::Test);

        assert!(matches!(reader.images(), Err(Error::Io(_))));
        assert!(matches!(reader.read(), Err(Error::Io(_))));
    }

    #[test]
    fn reader_pairs_files_from_disk() {
        let dir = std::env::temp_dir().join(format!("ffnet-mnist-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut images = header(2051, &[2, 1, 2]);
        images.extend_from_slice(&[10, 20, 30, 40]);
        let mut labels = header(2049, &[2]);
        labels.extend_from_slice(&[1, 2]);
        std::fs::write(dir.join(Split::Train.images_file()), images).unwrap();
        std::fs::write(dir.join(Split::Train.labels_file()), labels).unwrap();

        let (x, y) = MnistReader::in_folder(&dir, Split::Train).read().unwrap();

        assert_eq!(x, vec![vec![10.0, 20.0], vec![30.0, 40.0]]);
        assert_eq!(y, vec![1, 2]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
