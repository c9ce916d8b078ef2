mod error;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

use std::fs;

use ct_codecs::{Base64, Decoder, Encoder};
use quick_xml::events::Event;
use quick_xml::Reader;
use rsa::pkcs1v15;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rsa::signature::SignatureEncoding;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

const BASE64_IGNORE: &[u8] = b" \t\r\n";

// Update packages are signed with RSA PKCS#1 v1.5 over the SHA1 digest of
// the whole package file. Keys travel as .NET style <RSAKeyValue> XML.

/// Parses `<RSAKeyValue><Modulus>..</Modulus><Exponent>..</Exponent></RSAKeyValue>`.
///
/// Both values are big-endian base64. The exponent may be shorter than 4 bytes
/// and is right-aligned before use.
pub fn parse_public_key_xml(xml: &str) -> Result<RsaPublicKey> {
    let mut reader = Reader::from_str(xml);

    let mut current: Option<Vec<u8>> = None;
    let mut modulus = String::new();
    let mut exponent = String::new();

    loop {
        match reader.read_event().map_err(Error::ParseKeyXml)? {
            Event::Start(e) => current = Some(e.local_name().as_ref().to_vec()),
            Event::End(_) => current = None,
            Event::Text(t) => match current.as_deref() {
                Some(b"Modulus") => modulus.push_str(&String::from_utf8_lossy(t.as_ref())),
                Some(b"Exponent") => exponent.push_str(&String::from_utf8_lossy(t.as_ref())),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let modulus = decode_element("Modulus", &modulus)?;
    let exponent = decode_element("Exponent", &exponent)?;

    if exponent.len() > 4 {
        return Err(Error::InvalidExponentLength(exponent.len()));
    }
    let mut buf = [0u8; 4];
    buf[4 - exponent.len()..].copy_from_slice(&exponent);

    RsaPublicKey::new(BigUint::from_bytes_be(&modulus), BigUint::from(u32::from_be_bytes(buf))).map_err(Error::BuildPublicKey)
}

fn decode_element(name: &'static str, text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::MissingKeyElement(name));
    }

    Base64::decode_to_vec(text, Some(BASE64_IGNORE)).map_err(|err| Error::DecodeBase64(name, err))
}

/// Renders a public key in the XML form understood by [`parse_public_key_xml`].
pub fn public_key_to_xml(public_key: &RsaPublicKey) -> Result<String> {
    let modulus = Base64::encode_to_string(public_key.n().to_bytes_be()).map_err(|err| Error::EncodeBase64("Modulus", err))?;
    let exponent = Base64::encode_to_string(public_key.e().to_bytes_be()).map_err(|err| Error::EncodeBase64("Exponent", err))?;

    Ok(format!("<RSAKeyValue><Modulus>{modulus}</Modulus><Exponent>{exponent}</Exponent></RSAKeyValue>"))
}

// Takes a SHA1 digest, signature and a public key, to verify the digest
// with the public key.
pub fn verify_rsa_pkcs_prehash(digestbuf: &[u8], signature: &[u8], public_key: RsaPublicKey) -> Result<()> {
    let verifying_key = pkcs1v15::VerifyingKey::<Sha1>::new(public_key);

    verifying_key
        .verify_prehash(
            digestbuf,
            &pkcs1v15::Signature::try_from(signature).map_err(Error::InvalidPkcs1v15Signature)?,
        )
        .map_err(Error::CouldNotVerifySignature)
}

// Signs a SHA1 digest the way update packages are signed; used when preparing
// packages and in tests.
pub fn sign_rsa_pkcs_prehash(digestbuf: &[u8], private_key: RsaPrivateKey) -> Result<Vec<u8>> {
    let signing_key = pkcs1v15::SigningKey::<Sha1>::new(private_key);

    let signature = signing_key.sign_prehash(digestbuf).map_err(Error::SignPrehash)?;
    Ok(signature.to_vec())
}

pub fn get_private_key_pkcs8_pem(private_key_path: &str) -> Result<RsaPrivateKey> {
    let private_key_buf = fs::read_to_string(private_key_path).map_err(Error::ReadPrivateKey)?;
    RsaPrivateKey::from_pkcs8_pem(private_key_buf.as_str()).map_err(Error::DeserialisePkcs8)
}

pub fn get_public_key_pkcs8_pem(public_key_path: &str) -> Result<RsaPublicKey> {
    let public_key_buf = fs::read_to_string(public_key_path).map_err(Error::ReadPublicKey)?;
    RsaPublicKey::from_public_key_pem(public_key_buf.as_str()).map_err(Error::DecodePublicKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wyu_types::Hasher;

    const TESTDATA: &str = "test data for verifying signature";
    const PRIVKEY_PKCS8_PATH: &str = "../src/testdata/private_key_test_pkcs8.pem";
    const PUBKEY_PKCS8_PATH: &str = "../src/testdata/public_key_test_pkcs8.pem";

    #[test]
    fn test_verify_sig() {
        let digest = wyu_types::Sha1::digest(TESTDATA.as_bytes());

        let signature = sign_rsa_pkcs_prehash(&digest, get_private_key_pkcs8_pem(PRIVKEY_PKCS8_PATH).unwrap()).unwrap_or_else(|error| {
            panic!("failed to sign data: {:?}", error);
        });

        verify_rsa_pkcs_prehash(&digest, signature.as_slice(), get_public_key_pkcs8_pem(PUBKEY_PKCS8_PATH).unwrap()).unwrap_or_else(|error| {
            panic!("failed to verify data: {:?}", error);
        });
    }

    #[test]
    fn test_verify_sig_rejects_other_digest() {
        let digest = wyu_types::Sha1::digest(TESTDATA.as_bytes());
        let signature = sign_rsa_pkcs_prehash(&digest, get_private_key_pkcs8_pem(PRIVKEY_PKCS8_PATH).unwrap()).unwrap();

        let other = wyu_types::Sha1::digest(b"tampered data");
        assert!(matches!(verify_rsa_pkcs_prehash(&other, &signature, get_public_key_pkcs8_pem(PUBKEY_PKCS8_PATH).unwrap()), Err(Error::CouldNotVerifySignature(_))));
    }

    #[test]
    fn test_public_key_xml_round_trip() {
        let public_key = get_public_key_pkcs8_pem(PUBKEY_PKCS8_PATH).unwrap();
        let xml = public_key_to_xml(&public_key).unwrap();

        assert!(xml.contains("<Exponent>AQAB</Exponent>"));
        assert_eq!(parse_public_key_xml(&xml).unwrap(), public_key);
    }

    #[test]
    fn test_short_exponent_is_right_aligned() {
        let public_key = get_public_key_pkcs8_pem(PUBKEY_PKCS8_PATH).unwrap();
        let xml = public_key_to_xml(&public_key).unwrap();

        let parsed = parse_public_key_xml(&xml).unwrap();
        assert_eq!(parsed.e(), &BigUint::from(65537u32));
    }

    #[test]
    fn test_encode_error_names_element() {
        let err = Error::EncodeBase64("Modulus", ct_codecs::Error::Overflow);
        assert!(err.to_string().starts_with("failed to encode <Modulus> as base64"));
    }

    #[test]
    fn test_parse_public_key_xml_errors() {
        assert!(matches!(parse_public_key_xml("<RSAKeyValue><Exponent>AQAB</Exponent></RSAKeyValue>"), Err(Error::MissingKeyElement("Modulus"))));
        assert!(matches!(parse_public_key_xml("<RSAKeyValue><Modulus>!!!!</Modulus><Exponent>AQAB</Exponent></RSAKeyValue>"), Err(Error::DecodeBase64("Modulus", _))));
        assert!(matches!(parse_public_key_xml("<RSAKeyValue><Modulus>AQAB</Modulus><Exponent>AQIDBAU=</Exponent></RSAKeyValue>"), Err(Error::InvalidExponentLength(5))));
    }
}
