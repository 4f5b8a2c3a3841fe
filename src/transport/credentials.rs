//! Credential decoding for the TLS client.
//!
//! Gateway credentials usually arrive as an exported PKCS#12 bundle or as
//! PEM files with a passphrase-protected key. rustls handles neither, so
//! `openssl` decodes them into DER and the result feeds a rustls
//! [`ClientConfig`].

// Rust guideline compliant 2026-02

use openssl::error::ErrorStack;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509Ref, X509};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore};

use super::{ConnectOptions, Credentials};
use crate::error::{Error, Result};

/// Certificate chain plus private key for client authentication.
pub type Identity = (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>);

fn credential_error(what: &'static str) -> impl Fn(ErrorStack) -> Error {
    move |e| Error::Credentials(format!("{what}: {e}"))
}

/// Build the rustls client configuration for `options`.
///
/// Trust anchors come from the `ca` credential when present, otherwise from
/// the bundled web PKI roots.
pub fn client_config(options: &ConnectOptions) -> Result<ClientConfig> {
    let identity = decode_identity(&options.credentials, options.passphrase.as_deref())?;
    let roots = root_store(&options.credentials)?;

    let builder = ClientConfig::builder().with_root_certificates(roots);
    match identity {
        Some((chain, key)) => builder
            .with_client_auth_cert(chain, key)
            .map_err(|e| Error::Credentials(format!("client certificate rejected: {e}"))),
        None => {
            log::warn!("[Tls] No client certificate configured; the gateway will refuse the session");
            Ok(builder.with_no_client_auth())
        }
    }
}

/// Decode the client identity, if any credentials are configured.
pub fn decode_identity(credentials: &Credentials, passphrase: Option<&str>) -> Result<Option<Identity>> {
    match credentials {
        Credentials::Pfx(bundle) => decode_pfx(bundle, passphrase).map(Some),
        Credentials::Pem {
            key: Some(key),
            cert: Some(cert),
            ..
        } => decode_pem(key, cert, passphrase).map(Some),
        Credentials::Pem {
            key: Some(_),
            cert: None,
            ..
        } => Err(Error::Credentials("private key given without a certificate".into())),
        Credentials::Pem {
            key: None,
            cert: Some(_),
            ..
        } => Err(Error::Credentials("certificate given without a private key".into())),
        Credentials::Pem { .. } => Ok(None),
    }
}

fn decode_pfx(bundle: &[u8], passphrase: Option<&str>) -> Result<Identity> {
    let parsed = Pkcs12::from_der(bundle)
        .map_err(credential_error("pfx bundle is not PKCS#12"))?
        .parse2(passphrase.unwrap_or(""))
        .map_err(credential_error("pfx bundle could not be opened"))?;

    let pkey = parsed
        .pkey
        .ok_or_else(|| Error::Credentials("pfx bundle has no private key".into()))?;
    let leaf = parsed
        .cert
        .ok_or_else(|| Error::Credentials("pfx bundle has no certificate".into()))?;

    let mut chain = vec![certificate_der(&leaf)?];
    if let Some(extra) = parsed.ca {
        for cert in &extra {
            chain.push(certificate_der(cert)?);
        }
    }

    Ok((chain, private_key_der(&pkey)?))
}

fn decode_pem(key: &[u8], cert: &[u8], passphrase: Option<&str>) -> Result<Identity> {
    // Always pass a passphrase so an encrypted key fails instead of prompting on the TTY.
    let pkey = PKey::private_key_from_pem_passphrase(key, passphrase.unwrap_or("").as_bytes())
        .map_err(credential_error("private key could not be read"))?;

    let certs = X509::stack_from_pem(cert).map_err(credential_error("certificate could not be read"))?;
    if certs.is_empty() {
        return Err(Error::Credentials("certificate PEM holds no certificates".into()));
    }
    let chain = certs.iter().map(|c| certificate_der(c)).collect::<Result<Vec<_>>>()?;

    Ok((chain, private_key_der(&pkey)?))
}

fn certificate_der(cert: &X509Ref) -> Result<CertificateDer<'static>> {
    cert.to_der()
        .map(CertificateDer::from)
        .map_err(credential_error("certificate could not be encoded"))
}

fn private_key_der(pkey: &PKey<Private>) -> Result<PrivateKeyDer<'static>> {
    pkey.private_key_to_pkcs8()
        .map(|der| PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(der)))
        .map_err(credential_error("private key could not be encoded"))
}

fn root_store(credentials: &Credentials) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();

    if let Credentials::Pem { ca: Some(ca), .. } = credentials {
        let anchors = X509::stack_from_pem(ca).map_err(credential_error("ca could not be read"))?;
        if anchors.is_empty() {
            return Err(Error::Credentials("ca PEM holds no certificates".into()));
        }
        for anchor in &anchors {
            roots
                .add(certificate_der(anchor)?)
                .map_err(|e| Error::Credentials(format!("ca certificate rejected: {e}")))?;
        }
        log::debug!("[Tls] Using {} configured trust anchor(s)", roots.len());
    } else {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    Ok(roots)
}
