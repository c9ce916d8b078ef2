#[derive(Debug)]
pub enum Error {
    ParseKeyXml(quick_xml::Error),
    MissingKeyElement(&'static str),
    DecodeBase64(&'static str, ct_codecs::Error),
    EncodeBase64(&'static str, ct_codecs::Error),
    InvalidExponentLength(usize),
    BuildPublicKey(rsa::Error),
    InvalidPkcs1v15Signature(rsa::signature::Error),
    CouldNotVerifySignature(rsa::signature::Error),
    SignPrehash(rsa::signature::Error),
    ReadPrivateKey(std::io::Error),
    DeserialisePkcs8(rsa::pkcs8::Error),
    ReadPublicKey(std::io::Error),
    DecodePublicKey(rsa::pkcs8::spki::Error),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::ParseKeyXml(err) => write!(f, "failed to parse public key XML: {err}"),
            Error::MissingKeyElement(name) => write!(f, "public key XML has no <{name}> element"),
            Error::DecodeBase64(name, err) => write!(f, "failed to decode base64 <{name}>: {err}"),
            Error::EncodeBase64(name, err) => write!(f, "failed to encode <{name}> as base64: {err}"),
            Error::InvalidExponentLength(len) => write!(f, "public exponent is {len} bytes long, at most 4 are supported"),
            Error::BuildPublicKey(err) => write!(f, "invalid RSA public key: {err}"),
            Error::InvalidPkcs1v15Signature(err) => write!(f, "invalid pkcs1v15 signature: {err}"),
            Error::CouldNotVerifySignature(err) => write!(f, "failed to verify signature: {err}"),
            Error::SignPrehash(err) => write!(f, "failed to sign digest: {err}"),
            Error::ReadPrivateKey(err) => write!(f, "failed to read private key: {err}"),
            Error::DeserialisePkcs8(err) => write!(f, "failed to deserialise PKCS8 PEM: {err}"),
            Error::ReadPublicKey(err) => write!(f, "failed to read public key: {err}"),
            Error::DecodePublicKey(err) => write!(f, "failed to decode public key: {err}"),
        }
    }
}
