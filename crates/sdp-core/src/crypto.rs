//! Catalogs of SRTP crypto suites (RFC 4568) and certificate hash
//! functions (RFC 8122) as referenced from SDP bodies.
//!
//! Only the negotiation-relevant surface is modeled here: suite names,
//! key/salt geometry and lifetime bounds, and digest sizes. The actual
//! ciphers live behind the media path and are not part of this crate.

/// One SRTP crypto suite as named in `a=crypto` lines.
#[derive(Debug, PartialEq, Eq)]
pub struct CryptoSuite {
    /// Suite name as it appears on the wire
    pub name: &'static str,
    /// SRTP master key length in bytes
    pub master_key_len: usize,
    /// SRTP master salt length in bytes
    pub master_salt_len: usize,
    /// Maximum SRTP key lifetime the suite allows (2^48 per RFC 3711)
    pub srtp_lifetime: u64,
    /// Maximum SRTCP key lifetime (2^31 per RFC 3711)
    pub srtcp_lifetime: u64,
}

const SRTP_LIFETIME: u64 = 1 << 48;
const SRTCP_LIFETIME: u64 = 1 << 31;

macro_rules! suite {
    ($name:literal, $key:expr, $salt:expr) => {
        CryptoSuite {
            name: $name,
            master_key_len: $key,
            master_salt_len: $salt,
            srtp_lifetime: SRTP_LIFETIME,
            srtcp_lifetime: SRTCP_LIFETIME,
        }
    };
}

/// All suites we can negotiate, in preference order.
pub static CRYPTO_SUITES: &[CryptoSuite] = &[
    suite!("AEAD_AES_256_GCM", 32, 12),
    suite!("AEAD_AES_128_GCM", 16, 12),
    suite!("AES_256_CM_HMAC_SHA1_80", 32, 14),
    suite!("AES_256_CM_HMAC_SHA1_32", 32, 14),
    suite!("AES_192_CM_HMAC_SHA1_80", 24, 14),
    suite!("AES_192_CM_HMAC_SHA1_32", 24, 14),
    suite!("AES_CM_128_HMAC_SHA1_80", 16, 14),
    suite!("AES_CM_128_HMAC_SHA1_32", 16, 14),
    suite!("F8_128_HMAC_SHA1_80", 16, 14),
    suite!("F8_128_HMAC_SHA1_32", 16, 14),
    suite!("NULL_HMAC_SHA1_80", 16, 14),
    suite!("NULL_HMAC_SHA1_32", 16, 14),
];

/// Looks up a crypto suite by wire name. Suite names match
/// case-insensitively for interop with sloppy peers.
pub fn crypto_find_suite(name: &str) -> Option<&'static CryptoSuite> {
    CRYPTO_SUITES
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
}

/// A certificate digest function usable in `a=fingerprint`.
#[derive(Debug, PartialEq, Eq)]
pub struct DtlsHashFunc {
    /// Hash name as it appears on the wire (RFC 8122 token)
    pub name: &'static str,
    /// Digest length in bytes
    pub num_bytes: usize,
}

/// Hash functions accepted in fingerprints, strongest first.
pub static DTLS_HASH_FUNCS: &[DtlsHashFunc] = &[
    DtlsHashFunc {
        name: "sha-256",
        num_bytes: 32,
    },
    DtlsHashFunc {
        name: "sha-1",
        num_bytes: 20,
    },
    DtlsHashFunc {
        name: "sha-224",
        num_bytes: 28,
    },
    DtlsHashFunc {
        name: "sha-384",
        num_bytes: 48,
    },
    DtlsHashFunc {
        name: "sha-512",
        num_bytes: 64,
    },
];

/// Looks up a fingerprint hash function by wire name, case-insensitively.
pub fn dtls_find_hash_func(name: &str) -> Option<&'static DtlsHashFunc> {
    DTLS_HASH_FUNCS
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
}

/// A certificate fingerprint, either received in SDP or computed from a
/// local certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash_func: &'static DtlsHashFunc,
    pub digest: Vec<u8>,
}

/// One SDES crypto parameter set, as harvested from an `a=crypto` line or
/// prepared for emission of one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesParams {
    pub tag: u32,
    pub suite: &'static CryptoSuite,
    pub master_key: Vec<u8>,
    pub master_salt: Vec<u8>,
    /// MKI value, big-endian encoded into its full wire length
    pub mki: Vec<u8>,
    pub unencrypted_srtp: bool,
    pub unencrypted_srtcp: bool,
    pub unauthenticated_srtp: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_suite_case_insensitive() {
        let s = crypto_find_suite("aes_cm_128_hmac_sha1_80").unwrap();
        assert_eq!(s.name, "AES_CM_128_HMAC_SHA1_80");
        assert_eq!(s.master_key_len, 16);
        assert_eq!(s.master_salt_len, 14);
    }

    #[test]
    fn test_unknown_suite() {
        assert!(crypto_find_suite("AES_CM_512_NOPE").is_none());
    }

    #[test]
    fn test_gcm_salt_length() {
        let s = crypto_find_suite("AEAD_AES_128_GCM").unwrap();
        assert_eq!(s.master_salt_len, 12);
    }

    #[test]
    fn test_hash_func_lookup() {
        assert_eq!(dtls_find_hash_func("SHA-256").unwrap().num_bytes, 32);
        assert_eq!(dtls_find_hash_func("sha-1").unwrap().num_bytes, 20);
        assert!(dtls_find_hash_func("md5").is_none());
    }
}
