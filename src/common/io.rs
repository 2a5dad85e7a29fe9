//! Common, IO-related code.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use flate2::{bufread::MultiGzDecoder, write::GzEncoder, Compression};

/// Leading bytes of every gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Whether the path asks for gzip output (`.gz` or `.bgz`).
fn wants_gzip(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("gz") | Some("bgz")
    )
}

/// Open a file for reading, decompressing it if its content is gzip.
///
/// The decision is made on the leading bytes, so compressed inputs without a
/// `.gz` suffix (and plain inputs with one) are read correctly.  Concatenated
/// gzip members (e.g., bgzip output) are read as one stream.
pub fn open_read_maybe_gz<P>(path: P) -> Result<Box<dyn BufRead>, anyhow::Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let mut reader = File::open(path)
        .map(BufReader::new)
        .with_context(|| format!("could not open {}", path.display()))?;
    let gzipped = reader
        .fill_buf()
        .with_context(|| format!("could not read from {}", path.display()))?
        .starts_with(&GZIP_MAGIC);

    tracing::trace!("reading {} (gzip: {})", path.display(), gzipped);
    let reader: Box<dyn BufRead> = if gzipped {
        Box::new(BufReader::new(MultiGzDecoder::new(reader)))
    } else {
        Box::new(reader)
    };
    Ok(reader)
}

/// Create a file for writing, compressing when the suffix is `.gz` or `.bgz`.
///
/// The returned writer must be flushed (or dropped) before the file is read
/// back.
pub fn open_write_maybe_gz<P>(path: P) -> Result<Box<dyn Write>, anyhow::Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let writer = File::create(path)
        .map(BufWriter::new)
        .with_context(|| format!("could not create {}", path.display()))?;

    let gzipped = wants_gzip(path);
    tracing::trace!("writing {} (gzip: {})", path.display(), gzipped);
    let writer: Box<dyn Write> = if gzipped {
        Box::new(GzEncoder::new(writer, Compression::default()))
    } else {
        Box::new(writer)
    };
    Ok(writer)
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};

    use pretty_assertions::assert_eq;

    #[rstest::rstest]
    #[case("test.txt")]
    #[case("test.txt.gz")]
    #[case("test.txt.bgz")]
    fn write_then_read_maybe_gz(#[case] filename: &str) -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();

        {
            let mut f = super::open_write_maybe_gz(tmp_dir.join(filename))?;
            f.write_all(b"chrom\tpos\n1\t100\n")?;
            f.flush()?;
        }

        let raw = std::fs::read(tmp_dir.join(filename))?;
        assert_eq!(
            raw.starts_with(&super::GZIP_MAGIC),
            !filename.ends_with(".txt")
        );

        let mut contents = String::new();
        super::open_read_maybe_gz(tmp_dir.join(filename))?.read_to_string(&mut contents)?;
        assert_eq!(contents, "chrom\tpos\n1\t100\n");

        Ok(())
    }

    #[test]
    fn read_gzip_without_suffix() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join("segdups.tsv");

        let mut encoder = flate2::write::GzEncoder::new(
            std::fs::File::create(&path)?,
            flate2::Compression::default(),
        );
        encoder.write_all(b"1\t10\t20\n")?;
        encoder.finish()?;

        let contents = std::io::read_to_string(super::open_read_maybe_gz(&path)?)?;
        assert_eq!(contents, "1\t10\t20\n");

        Ok(())
    }

    #[test]
    fn read_empty_file() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join("empty.tsv.gz");
        std::fs::File::create(&path)?;

        let contents = std::io::read_to_string(super::open_read_maybe_gz(&path)?)?;
        assert_eq!(contents, "");

        Ok(())
    }

    #[test]
    fn open_read_missing_file() {
        let tmp_dir = temp_testdir::TempDir::default();
        let err = super::open_read_maybe_gz(tmp_dir.join("missing.tsv"))
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.starts_with("could not open"), "{}", err);
    }
}
