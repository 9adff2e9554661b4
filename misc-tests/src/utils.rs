use std::io::IoSlice;
use std::net::TcpStream;
use std::time::Duration;

use openssl::ssl::{SslAcceptor, SslConnector, SslMethod, SslVerifyMode, SslVersion};
use stream_bio::{Transport, TransportResult};

pub const HELLO: &str = "hello";

pub mod ssl_gen {
    //! Self signed certificates for the test peers.

    use openssl::asn1::Asn1Time;
    use openssl::bn::{BigNum, MsbOption};
    use openssl::error::ErrorStack;
    use openssl::hash::MessageDigest;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectAlternativeName};
    use openssl::x509::{X509, X509NameBuilder};

    pub fn mk_self_signed_cert(
        subject_alt_names: &[&str],
    ) -> Result<(X509, PKey<Private>), ErrorStack> {
        let key_pair = PKey::from_rsa(Rsa::generate(2048)?)?;

        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_text("O", "stream-bio tests")?;
        name.append_entry_by_text("CN", "localhost")?;
        let name = name.build();

        let mut builder = X509::builder()?;
        builder.set_version(2)?;
        let serial = {
            let mut serial = BigNum::new()?;
            serial.rand(159, MsbOption::MAYBE_ZERO, false)?;
            serial.to_asn1_integer()?
        };
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_pubkey(&key_pair)?;
        let not_before = Asn1Time::days_from_now(0)?;
        builder.set_not_before(&not_before)?;
        let not_after = Asn1Time::days_from_now(1)?;
        builder.set_not_after(&not_after)?;
        builder.append_extension(BasicConstraints::new().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .build()?,
        )?;

        let mut san = SubjectAlternativeName::new();
        for n in subject_alt_names {
            san.dns(n);
        }
        let san = san.build(&builder.x509v3_context(None, None))?;
        builder.append_extension(san)?;

        builder.sign(&key_pair, MessageDigest::sha256())?;
        Ok((builder.build(), key_pair))
    }

    #[test]
    fn cert_is_valid_today() {
        use std::cmp::Ordering;

        let (cert, key_pair) = mk_self_signed_cert(&["localhost"]).unwrap();
        let now = Asn1Time::days_from_now(0).unwrap();
        assert_ne!(cert.not_before().compare(&now).unwrap(), Ordering::Greater);
        assert_eq!(cert.not_after().compare(&now).unwrap(), Ordering::Greater);
        assert!(cert.public_key().unwrap().public_eq(&key_pair));
    }
}

pub fn create_openssl_acceptor(
    cert: &openssl::x509::X509,
    key: &openssl::pkey::PKey<openssl::pkey::Private>,
) -> SslAcceptor {
    let mut acceptor = SslAcceptor::mozilla_intermediate(SslMethod::tls()).unwrap();
    acceptor.set_private_key(key).unwrap();
    acceptor.set_certificate(cert).unwrap();
    acceptor.check_private_key().unwrap();
    acceptor
        .set_min_proto_version(Some(SslVersion::TLS1_2))
        .unwrap();
    acceptor.build()
}

pub fn create_openssl_connector(cert: &openssl::x509::X509) -> SslConnector {
    let mut connector = SslConnector::builder(SslMethod::tls()).unwrap();
    connector.cert_store_mut().add_cert(cert.clone()).unwrap();
    // self signed, the tests only exercise the transport
    connector.set_verify(SslVerifyMode::NONE);
    connector
        .set_min_proto_version(Some(SslVersion::TLS1_2))
        .unwrap();
    connector.build()
}

/// Socket transport that accepts at most `max` bytes per write, so every
/// TLS record reaches the wire through several short writes.
pub struct Chunked {
    pub inner: TcpStream,
    pub max: usize,
    pub short_writes: usize,
}

impl Chunked {
    pub fn new(inner: TcpStream, max: usize) -> Self {
        Chunked {
            inner,
            max,
            short_writes: 0,
        }
    }
}

impl Transport for Chunked {
    fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> TransportResult<usize> {
        Transport::read(&mut self.inner, buf, timeout)
    }

    fn write_vectored(
        &mut self,
        bufs: &[IoSlice<'_>],
        timeout: Option<Duration>,
    ) -> TransportResult<usize> {
        let Some(first) = bufs.first() else {
            return TransportResult::Ok(0);
        };
        let n = first.len().min(self.max);
        let res = Transport::write_vectored(&mut self.inner, &[IoSlice::new(&first[..n])], timeout);
        if let TransportResult::Ok(written) = res {
            if written < first.len() {
                self.short_writes += 1;
            }
        }
        res
    }
}
