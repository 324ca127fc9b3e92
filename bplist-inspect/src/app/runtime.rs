use std::{
    fs,
    io::{stdout, Write},
};

use tracing::{debug, info};

use bplist_codec::{
    bplist::{
        reader::{decode, is_signature_valid, BinaryPlistReader},
        trailer::Trailer,
        writer::encode,
    },
    BinaryPlistError, Value,
};

use crate::app::{error::RuntimeError, options::Options, summary::Summary};

/// Stores the application state and handles application lifecycle
pub struct Config {
    /// App configuration options
    pub options: Options,
    /// The contents of the input file
    pub bytes: Vec<u8>,
}

impl Config {
    /// Read the input file described by the options
    pub fn new(options: Options) -> Result<Config, RuntimeError> {
        let bytes =
            fs::read(&options.path).map_err(|why| RuntimeError::ReadError(why, options.path.clone()))?;
        debug!(path = ?options.path, bytes = bytes.len(), "read input file");
        Ok(Config { options, bytes })
    }

    /// The bytes selected by the offset and length options
    fn window(&self) -> Result<&[u8], RuntimeError> {
        let start = self.options.byte_offset;
        let end = match self.options.byte_length {
            Some(length) => start.saturating_add(length),
            None => self.bytes.len(),
        };
        self.bytes.get(start..end).ok_or_else(|| {
            RuntimeError::InvalidOptions(format!(
                "Bytes {start}..{end} are outside of {:?}, which is {} bytes long",
                self.options.path,
                self.bytes.len()
            ))
        })
    }

    /// Decode the window of the input file selected by the options
    pub fn decode(&self) -> Result<(Value, Trailer), RuntimeError> {
        let window = self.window()?;
        if !is_signature_valid(window, 0) {
            return Err(RuntimeError::InvalidOptions(format!(
                "No binary property list signature at byte {} of {:?}",
                self.options.byte_offset, self.options.path
            )));
        }

        let mut reader = BinaryPlistReader::new(window);
        let root = reader.parse().map_err(RuntimeError::PlistError)?;
        let trailer = *reader.trailer().ok_or_else(|| {
            RuntimeError::PlistError(BinaryPlistError::InvalidTrailer(
                "no trailer after decoding".to_string(),
            ))
        })?;
        Ok((root, trailer))
    }

    /// Re-encode `root` and check that the result decodes to an equal graph
    pub fn verify(&self, root: &Value) -> Result<usize, RuntimeError> {
        let encoded = encode(root).map_err(RuntimeError::PlistError)?;
        let decoded = decode(&encoded).map_err(RuntimeError::PlistError)?;
        if &decoded != root {
            return Err(RuntimeError::VerificationFailed(
                "re-encoded graph does not decode to the original graph".to_string(),
            ));
        }
        info!(
            original = self.bytes.len(),
            reencoded = encoded.len(),
            "round trip verified"
        );
        Ok(encoded.len())
    }

    /// Handles the application lifecycle
    pub fn run(&self) -> Result<(), RuntimeError> {
        let (root, trailer) = self.decode()?;
        let summary = Summary::new(self.window()?.len(), trailer, &root);

        let mut out = stdout().lock();
        writeln!(out, "{summary}").map_err(RuntimeError::DiskError)?;

        if self.options.verify {
            let size = self.verify(&root)?;
            writeln!(out, "Round trip verified: re-encoded to {size} bytes")
                .map_err(RuntimeError::DiskError)?;
        }
        Ok(())
    }
}
