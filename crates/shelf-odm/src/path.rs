//! Bucket paths.
//!
//! Records of type `T` live under the top-level bucket named after `T`; each
//! record owns a child bucket keyed by its identifier:
//!
//! ```text
//! <type name>/
//!     <id>/
//!         <scalar field> = codec bytes
//!         <collection field>/
//!             00000000-<sub id>/  (first element)
//!             00000001-<sub id>/  (second element)
//! ```

use std::fmt;

/// A sequence of bucket names from the top level down.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BucketPath {
    segments: Vec<Vec<u8>>,
}

impl BucketPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Vec<u8>] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// This path extended by one bucket name.
    pub fn child(&self, segment: impl AsRef<[u8]>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.as_ref().to_vec());
        Self { segments }
    }
}

impl fmt::Display for BucketPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match std::str::from_utf8(segment) {
                Ok(text) => f.write_str(text)?,
                Err(_) => write!(f, "0x{}", hex::encode(segment))?,
            }
        }
        Ok(())
    }
}

/// Path of the bucket holding every record of a type.
pub fn type_bucket_path(type_name: &str) -> BucketPath {
    BucketPath::new().child(type_name)
}

/// Path of the bucket holding one record.
pub fn instance_bucket_path(type_name: &str, id: &str) -> BucketPath {
    type_bucket_path(type_name).child(id)
}
