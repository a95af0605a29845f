//! Assembly identities and strong-name public key tokens.

use std::fmt;

use bitflags::bitflags;
use md5::{Digest, Md5};
use sha1::Sha1;

use crate::Result;

/// `AssemblyHashAlgorithm` values (ECMA-335 II.23.1.1)
#[allow(non_snake_case)]
pub mod AssemblyHashAlgorithm {
    /// No algorithm recorded
    pub const NONE: u32 = 0x0000;
    /// MD5
    pub const MD5: u32 = 0x8003;
    /// SHA-1
    pub const SHA1: u32 = 0x8004;
}

bitflags! {
    /// `AssemblyFlags` (ECMA-335 II.23.1.2)
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AssemblyFlags: u32 {
        /// The blob holds the full public key, not its token
        const PUBLIC_KEY = 0x0001;
        /// The reference may be retargeted to a different publisher at runtime
        const RETARGETABLE = 0x0100;
        /// Content type `WindowsRuntime`
        const WINDOWS_RUNTIME = 0x0200;
        /// Disable JIT optimizations
        const DISABLE_JIT_COMPILE_OPTIMIZER = 0x4000;
        /// Enable JIT tracking
        const ENABLE_JIT_COMPILE_TRACKING = 0x8000;
    }
}

/// An 8 byte public key token, in display order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKeyToken(pub [u8; 8]);

impl fmt::Display for PublicKeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PublicKeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyToken({self})")
    }
}

/// Compute the token of a strong-name public key.
///
/// The token is the last 8 bytes of the key's hash in reverse order. `NONE` falls back to SHA-1,
/// which is what the runtime uses for references that carry no algorithm.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for hash algorithms other than SHA-1 and MD5.
pub fn public_key_token(public_key: &[u8], algorithm: u32) -> Result<PublicKeyToken> {
    let digest: Vec<u8> = match algorithm {
        AssemblyHashAlgorithm::NONE | AssemblyHashAlgorithm::SHA1 => {
            let mut hasher = Sha1::new();
            hasher.update(public_key);
            hasher.finalize().to_vec()
        }
        AssemblyHashAlgorithm::MD5 => {
            let mut hasher = Md5::new();
            hasher.update(public_key);
            hasher.finalize().to_vec()
        }
        _ => {
            return Err(malformed_error!(
                "Unsupported assembly hash algorithm - {:#x}",
                algorithm
            ))
        }
    };

    let mut token = [0u8; 8];
    for (slot, byte) in token.iter_mut().zip(digest.iter().rev()) {
        *slot = *byte;
    }

    Ok(PublicKeyToken(token))
}

/// The strong-name half of an assembly identity.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// The full public key
    PubKey(Vec<u8>),
    /// A precomputed token
    Token(PublicKeyToken),
}

impl Identity {
    /// Interpret a `PublicKey`/`PublicKeyOrToken` blob
    ///
    /// # Errors
    /// Returns an error if a token blob is not exactly 8 bytes.
    pub fn from(data: &[u8], is_pub: bool) -> Result<Self> {
        if is_pub {
            return Ok(Identity::PubKey(data.to_vec()));
        }

        let token: [u8; 8] = data
            .try_into()
            .map_err(|_| malformed_error!("Public key token must be 8 bytes, got {}", data.len()))?;

        Ok(Identity::Token(PublicKeyToken(token)))
    }

    /// The token of this identity, hashing the key if needed
    ///
    /// # Errors
    /// Returns an error for an unsupported hash algorithm.
    pub fn to_token(&self, algorithm: u32) -> Result<PublicKeyToken> {
        match self {
            Identity::PubKey(key) => public_key_token(key, algorithm),
            Identity::Token(token) => Ok(*token),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::PubKey(key) => write!(f, "PubKey({} bytes)", key.len()),
            Identity::Token(token) => write!(f, "Token({token})"),
        }
    }
}

/// A four part assembly version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssemblyVersion {
    /// Major
    pub major: u16,
    /// Minor
    pub minor: u16,
    /// Build
    pub build: u16,
    /// Revision
    pub revision: u16,
}

impl AssemblyVersion {
    /// Create a version
    #[must_use]
    pub fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        AssemblyVersion {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse `a[.b[.c[.d]]]`, missing parts are zero
    #[must_use]
    pub fn parse(value: &str) -> Option<AssemblyVersion> {
        let mut parts = [0u16; 4];
        for (index, part) in value.split('.').enumerate() {
            if index == 4 {
                return None;
            }
            parts[index] = part.trim().parse().ok()?;
        }

        Some(AssemblyVersion::new(parts[0], parts[1], parts[2], parts[3]))
    }

    /// True for `0.0.0.0`
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == AssemblyVersion::default()
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// Name, version, culture and strong name of an assembly definition or reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssemblyIdentity {
    /// Simple name, without extension
    pub name: String,
    /// Version
    pub version: AssemblyVersion,
    /// Culture, `None` for neutral
    pub culture: Option<String>,
    /// Public key or token, `None` for unsigned assemblies
    pub strong_name: Option<Identity>,
    /// `AssemblyFlags`
    pub flags: AssemblyFlags,
    /// Hash algorithm used to derive tokens from a full key
    pub hash_algorithm: u32,
}

impl AssemblyIdentity {
    /// The public key token, derived from the key if the identity carries one
    #[must_use]
    pub fn public_key_token(&self) -> Option<PublicKeyToken> {
        match &self.strong_name {
            Some(identity) => match identity.to_token(self.hash_algorithm) {
                Ok(token) => Some(token),
                Err(error) => {
                    log::warn!("Cannot derive public key token of {} - {error}", self.name);
                    None
                }
            },
            None => None,
        }
    }

    /// True if the identity names a Windows Runtime metadata assembly
    #[must_use]
    pub fn is_windows_runtime(&self) -> bool {
        self.flags.contains(AssemblyFlags::WINDOWS_RUNTIME)
    }

    /// True if the reference is retargetable
    #[must_use]
    pub fn is_retargetable(&self) -> bool {
        self.flags.contains(AssemblyFlags::RETARGETABLE)
    }

    /// `Name, Version=a.b.c.d, Culture=neutral, PublicKeyToken=...`
    #[must_use]
    pub fn display_name(&self) -> String {
        let token = self
            .public_key_token()
            .map_or_else(|| "null".to_string(), |token| token.to_string());

        let mut display = format!(
            "{}, Version={}, Culture={}, PublicKeyToken={}",
            self.name,
            self.version,
            self.culture.as_deref().unwrap_or("neutral"),
            token
        );

        if self.is_retargetable() {
            display.push_str(", Retargetable=Yes");
        }
        if self.is_windows_runtime() {
            display.push_str(", ContentType=WindowsRuntime");
        }

        display
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
