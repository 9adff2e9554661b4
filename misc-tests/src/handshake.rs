use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;

use openssl::ssl::Ssl;
use stream_bio::{Error, StreamConfig, TlsStream};

use crate::utils::{
    Chunked, HELLO, create_openssl_acceptor, create_openssl_connector, ssl_gen,
};

fn read_to_end<S: Read>(s: &mut S) -> Vec<u8> {
    let mut data = Vec::new();
    loop {
        let mut buf = [0_u8; 100];
        let len = s.read(buf.as_mut_slice()).unwrap();
        if len == 0 {
            break;
        }
        data.extend_from_slice(&buf[..len]);
    }
    data
}

/// Server side on plain openssl: reads one hello, answers with two.
fn spawn_echo_server(l: TcpListener) -> std::thread::JoinHandle<()> {
    let (cert, key_pair) = ssl_gen::mk_self_signed_cert(&["localhost"]).unwrap();
    let ssl_acpt = create_openssl_acceptor(&cert, &key_pair);
    std::thread::spawn(move || {
        let (s, _) = l.accept().unwrap();
        let mut ssl_s = ssl_acpt.accept(s).unwrap();
        let mut buf = [0_u8; 100];
        let len = ssl_s.read(buf.as_mut_slice()).unwrap();
        assert_eq!(&buf[0..len], HELLO.as_bytes());

        ssl_s.write_all(HELLO.as_bytes()).unwrap();
        ssl_s.write_all(HELLO.as_bytes()).unwrap();
        ssl_s.shutdown().unwrap();
    })
}

fn client_ssl() -> Ssl {
    let (cert, _) = ssl_gen::mk_self_signed_cert(&["localhost"]).unwrap();
    create_openssl_connector(&cert)
        .configure()
        .unwrap()
        .into_ssl("localhost")
        .unwrap()
}

#[test]
fn client_over_tcp() {
    let l = TcpListener::bind("localhost:0").unwrap();
    let l_addr = l.local_addr().unwrap();
    let svr = spawn_echo_server(l);

    let tcp = TcpStream::connect(l_addr).unwrap();
    let mut ssl_s = TlsStream::new(client_ssl(), tcp, &StreamConfig::default()).unwrap();
    ssl_s.connect().unwrap();

    let len = ssl_s.write(HELLO.as_bytes()).unwrap();
    assert_eq!(len, HELLO.len());

    let data = read_to_end(&mut ssl_s);
    assert_eq!(data, HELLO.repeat(2).as_bytes());
    svr.join().unwrap();
}

#[test]
fn client_over_chunked_transport() {
    let l = TcpListener::bind("localhost:0").unwrap();
    let l_addr = l.local_addr().unwrap();
    let svr = spawn_echo_server(l);

    let tcp = TcpStream::connect(l_addr).unwrap();
    let mut ssl_s =
        TlsStream::new(client_ssl(), Chunked::new(tcp, 7), &StreamConfig::default()).unwrap();
    ssl_s.connect().unwrap();
    ssl_s.write_all(HELLO.as_bytes()).unwrap();

    let data = read_to_end(&mut ssl_s);
    assert_eq!(data, HELLO.repeat(2).as_bytes());
    // openssl resubmitted the remainders itself
    assert!(ssl_s.get_ref().short_writes > 0);
    svr.join().unwrap();
}

#[test]
fn server_over_tcp() {
    let l = TcpListener::bind("localhost:0").unwrap();
    let l_addr = l.local_addr().unwrap();

    let (cert, key_pair) = ssl_gen::mk_self_signed_cert(&["localhost"]).unwrap();
    let ssl_acpt = create_openssl_acceptor(&cert, &key_pair);
    let ssl_con = create_openssl_connector(&cert);

    let client = std::thread::spawn(move || {
        let tcp = TcpStream::connect(l_addr).unwrap();
        let mut ssl_s = ssl_con.connect("localhost", tcp).unwrap();
        ssl_s.write_all(HELLO.as_bytes()).unwrap();
        // echo, then close_notify
        let data = read_to_end(&mut ssl_s);
        assert_eq!(data, HELLO.as_bytes());
    });

    let (tcp, _) = l.accept().unwrap();
    let ssl = Ssl::new(ssl_acpt.context()).unwrap();
    let mut ssl_s = TlsStream::new(ssl, tcp, &StreamConfig::default()).unwrap();
    ssl_s.accept().unwrap();

    let mut buf = [0_u8; 100];
    let len = ssl_s.read(buf.as_mut_slice()).unwrap();
    assert_eq!(&buf[..len], HELLO.as_bytes());
    ssl_s.write_all(&buf[..len]).unwrap();
    ssl_s.shutdown().unwrap();

    client.join().unwrap();
}

#[test]
fn handshake_times_out_and_resumes() {
    let l = TcpListener::bind("localhost:0").unwrap();
    let l_addr = l.local_addr().unwrap();
    let (release, wait) = mpsc::channel::<()>();

    // accepts the tcp connection but never speaks tls
    let svr = std::thread::spawn(move || {
        let (s, _) = l.accept().unwrap();
        wait.recv().unwrap();
        drop(s);
    });

    let tcp = TcpStream::connect(l_addr).unwrap();
    let mut ssl_s = TlsStream::new(client_ssl(), tcp, &StreamConfig::from_millis(50)).unwrap();

    for _ in 0..2 {
        let err = ssl_s.connect().unwrap_err();
        assert!(matches!(err, Error::WouldBlock), "{err:?}");
    }

    release.send(()).unwrap();
    svr.join().unwrap();

    let err = ssl_s.connect().unwrap_err();
    assert!(!matches!(err, Error::WouldBlock), "{err:?}");
}
