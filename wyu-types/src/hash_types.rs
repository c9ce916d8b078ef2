use std::str;
use digest::Digest;

/// Wrapper struct around the SHA1 hashing algorithm from the `sha1` crate.
#[derive(Clone)]
pub struct Sha1(sha1::Sha1);

/// Wrapper struct around the rolling Adler-32 checksum from the `adler2` crate.
#[derive(Clone)]
pub struct Adler32(adler2::Adler32);

/// Fixed-size SHA1 digest type alias for [u8; 20].
pub type Sha1Digest = <Sha1 as Hasher>::Output;

/// Adler-32 checksum in big-endian byte order, [u8; 4].
pub type Adler32Digest = <Adler32 as Hasher>::Output;

/// Trait for generic hash/checksum algorithms and associated hashing logic.
pub trait Hasher {
    /// The name of the hashing algorithm; for logging/debugging purposes.
    const HASH_NAME: &'static str;

    /// The size of the digest of the hashing algorithm in bytes.
    const FINGERPRINT_SIZE: usize;

    /// The output type of the hashing algorithm (typically a [u8; N]).
    type Output: AsRef<[u8]> + AsMut<[u8]> + Default + Sized + PartialEq + Eq + Copy + std::fmt::Debug;

    /// Creates a new instance of the hasher.
    fn new() -> Self;

    /// Updates the hasher with the given bytes.
    fn update(&mut self, data: &[u8]);

    /// Finalizes the hash and returns the digest.
    fn finalize(self) -> Self::Output;

    /// Construct a hash of the output format of the associated hashing
    /// algorithm using a provided string.
    fn try_from_hex_string(s: &str) -> Result<Self::Output, String>;

    /// Hash a whole in-memory buffer in one go.
    fn digest(data: &[u8]) -> Self::Output
    where
        Self: Sized,
    {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}

impl Hasher for Sha1 {
    const HASH_NAME: &'static str = "Sha1";
    const FINGERPRINT_SIZE: usize = 20;

    type Output = [u8; Self::FINGERPRINT_SIZE];

    fn new() -> Self {
        Self(sha1::Sha1::new())
    }

    fn update(&mut self, data: &[u8]) {
        self.0.update(data)
    }

    fn finalize(self) -> Self::Output {
        self.0.finalize().into()
    }

    fn try_from_hex_string(s: &str) -> Result<Self::Output, String> {
        try_from_hex_string::<Self>(s)
    }
}

impl Hasher for Adler32 {
    const HASH_NAME: &'static str = "Adler32";
    const FINGERPRINT_SIZE: usize = 4;

    type Output = [u8; Self::FINGERPRINT_SIZE];

    fn new() -> Self {
        Self(adler2::Adler32::new())
    }

    fn update(&mut self, data: &[u8]) {
        self.0.write_slice(data)
    }

    fn finalize(self) -> Self::Output {
        self.0.checksum().to_be_bytes()
    }

    fn try_from_hex_string(s: &str) -> Result<Self::Output, String> {
        try_from_hex_string::<Self>(s)
    }
}

/// Numeric value of an Adler-32 digest, as stored in server manifests.
pub fn adler32_value(digest: &Adler32Digest) -> u32 {
    u32::from_be_bytes(*digest)
}

/// Lower-case hex rendering of any digest, for log output.
pub fn to_hex_string(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse a hexadecimal string into the output of the generically typed hashing
/// algorithm.
fn try_from_hex_string<T: Hasher>(s: &str) -> Result<T::Output, String> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return Err(format!("invalid hex string: {s:?}"));
    }

    let bytes = (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i + 2], 16)).collect::<Result<Vec<u8>, _>>().map_err(|e| e.to_string())?;

    if bytes.len() == T::FINGERPRINT_SIZE {
        let mut ret = T::Output::default();
        ret.as_mut().copy_from_slice(&bytes);
        Ok(ret)
    } else {
        Err(format!("invalid digest length: {}", bytes.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_known_value() {
        let digest = Sha1::digest(b"abc");
        assert_eq!(to_hex_string(&digest), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_adler32_known_value() {
        // reference value from RFC 1950 examples
        let digest = Adler32::digest(b"Wikipedia");
        assert_eq!(adler32_value(&digest), 0x11E6_0398);
    }

    #[test]
    fn test_adler32_incremental_matches_oneshot() {
        let mut hasher = Adler32::new();
        hasher.update(b"Wiki");
        hasher.update(b"pedia");
        assert_eq!(hasher.finalize(), Adler32::digest(b"Wikipedia"));
    }

    #[test]
    fn test_try_from_hex_string() {
        let digest = Sha1::try_from_hex_string("a9993e364706816aba3e25717850c26c9cd0d89d").unwrap();
        assert_eq!(digest, Sha1::digest(b"abc"));

        assert!(Sha1::try_from_hex_string("a999").is_err());
        assert!(Adler32::try_from_hex_string("zz").is_err());
        assert!(Adler32::try_from_hex_string("123").is_err());
    }
}
