//! Tests for backends/image_utils.rs

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use native_push::backends::MemoryAdapter;
use native_push::backends::image_utils::download_image;
use native_push::components::{Platform, PushError};
use native_push::NativePushPlugin;
use url::Url;

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Answer a single request on a local port with `head` followed by the body `write_body` sends
fn serve_once<F>(head: &'static str, write_body: F) -> anyhow::Result<Url>
where
    F: FnOnce(&mut TcpStream) -> std::io::Result<()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let url = Url::parse(&format!("http://{}/image.png", listener.local_addr()?))?;
    std::thread::spawn(move || -> std::io::Result<()> {
        let (mut stream, _) = listener.accept()?;
        let mut request = [0u8; 4096];
        let _ = stream.read(&mut request)?;
        stream.write_all(head.as_bytes())?;
        write_body(&mut stream)
    });
    Ok(url)
}

#[tokio::test]
async fn test_chunked_body_over_size_limit_is_rejected() -> anyhow::Result<()> {
    let url = serve_once(
        "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nTransfer-Encoding: chunked\r\n\r\n",
        |stream| {
            let mut chunk = vec![0u8; 64 * 1024];
            chunk[..PNG_HEADER.len()].copy_from_slice(PNG_HEADER);
            // 11 MiB without a Content-Length
            for _ in 0..176 {
                stream.write_all(format!("{:x}\r\n", chunk.len()).as_bytes())?;
                stream.write_all(&chunk)?;
                stream.write_all(b"\r\n")?;
            }
            stream.write_all(b"0\r\n\r\n")
        },
    )?;

    let error = download_image(&url).await.expect_err("oversized image should be refused");

    let PushError::ImageFetchFailed { message, .. } = error else {
        panic!("expected an image fetch failure, got {error:?}");
    };
    assert!(message.contains("too large"), "unexpected message: {message}");
    Ok(())
}

#[tokio::test]
async fn test_detaching_one_plugin_keeps_images_of_another() -> anyhow::Result<()> {
    let head = "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 8\r\nConnection: close\r\n\r\n";
    let url = serve_once(head, |stream| stream.write_all(PNG_HEADER))?;

    let first = NativePushPlugin::builder(Arc::new(MemoryAdapter::new(Platform::Linux))).build();
    let second = NativePushPlugin::builder(Arc::new(MemoryAdapter::new(Platform::Linux))).build();
    first.attach()?;
    second.attach()?;

    let image = download_image(&url).await?;
    assert!(image.is_temp);
    assert_eq!(std::fs::read(&image.path)?, PNG_HEADER);

    first.detach()?;
    assert!(image.path.exists());

    second.detach()?;
    Ok(())
}
