#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zipserve::{FileServer, MountRegistry, ServeConfig};

/// 2020-08-01 15:03:40 UTC, as stamped on every member by [`ZipBuilder`].
pub const MTIME: u64 = 1_596_294_220;
pub const MTIME_HTTP: &str = "Sat, 01 Aug 2020 15:03:40 GMT";
const DOS_DATE: u16 = (40 << 9) | (8 << 5) | 1;
const DOS_TIME: u16 = (15 << 11) | (3 << 5) | 20;

pub const TEST_HTML: &str = "<!DOCTYPE html>\n<html><body><p>test page</p></body></html>\n";
pub const INDEX_HTML: &str = "<!DOCTYPE html>\n<html><body><h1>index</h1></body></html>\n";

/// Writes minimal, valid ZIP archives.
#[derive(Default)]
pub struct ZipBuilder {
    data: Vec<u8>,
    central: Vec<u8>,
    count: u16,
    comment: Vec<u8>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, content: impl AsRef<[u8]>) -> Self {
        let content = content.as_ref();
        self.member(name, 0, 0, content, content.to_vec())
    }

    /// A member under an arbitrary method code; `content` is written as is.
    pub fn with_method(self, name: &str, method: u16, content: impl AsRef<[u8]>) -> Self {
        let content = content.as_ref();
        self.member(name, method, 0, content, content.to_vec())
    }

    /// A deflated member flagged as encrypted.
    pub fn encrypted(self, name: &str, content: impl AsRef<[u8]>) -> Self {
        let content = content.as_ref();
        self.member(name, 8, 1, content, deflate(content))
    }

    pub fn deflated(self, name: &str, content: impl AsRef<[u8]>) -> Self {
        let content = content.as_ref();
        self.member(name, 8, 0, content, deflate(content))
    }

    pub fn dir(self, name: &str) -> Self {
        let name = format!("{}/", name.trim_end_matches('/'));
        self.member(&name, 0, 0, &[], Vec::new())
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.as_bytes().to_vec();
        self
    }

    fn member(
        mut self,
        name: &str,
        method: u16,
        flags: u16,
        content: &[u8],
        stored: Vec<u8>,
    ) -> Self {
        let mut crc = flate2::Crc::new();
        crc.update(content);
        let offset = self.data.len() as u32;

        let w = &mut self.data;
        w.write_all(b"PK\x03\x04").unwrap();
        w.write_u16::<LittleEndian>(20).unwrap();
        w.write_u16::<LittleEndian>(flags).unwrap();
        w.write_u16::<LittleEndian>(method).unwrap();
        w.write_u16::<LittleEndian>(DOS_TIME).unwrap();
        w.write_u16::<LittleEndian>(DOS_DATE).unwrap();
        w.write_u32::<LittleEndian>(crc.sum()).unwrap();
        w.write_u32::<LittleEndian>(stored.len() as u32).unwrap();
        w.write_u32::<LittleEndian>(content.len() as u32).unwrap();
        w.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        w.write_u16::<LittleEndian>(0).unwrap();
        w.write_all(name.as_bytes()).unwrap();
        w.write_all(&stored).unwrap();

        let c = &mut self.central;
        c.write_all(b"PK\x01\x02").unwrap();
        c.write_u16::<LittleEndian>(20).unwrap();
        c.write_u16::<LittleEndian>(20).unwrap();
        c.write_u16::<LittleEndian>(flags).unwrap();
        c.write_u16::<LittleEndian>(method).unwrap();
        c.write_u16::<LittleEndian>(DOS_TIME).unwrap();
        c.write_u16::<LittleEndian>(DOS_DATE).unwrap();
        c.write_u32::<LittleEndian>(crc.sum()).unwrap();
        c.write_u32::<LittleEndian>(stored.len() as u32).unwrap();
        c.write_u32::<LittleEndian>(content.len() as u32).unwrap();
        c.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        c.write_u16::<LittleEndian>(0).unwrap();
        c.write_u16::<LittleEndian>(0).unwrap();
        c.write_u16::<LittleEndian>(0).unwrap();
        c.write_u16::<LittleEndian>(0).unwrap();
        c.write_u32::<LittleEndian>(0).unwrap();
        c.write_u32::<LittleEndian>(offset).unwrap();
        c.write_all(name.as_bytes()).unwrap();

        self.count += 1;
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = self.data;
        let cd_offset = out.len() as u32;
        out.extend_from_slice(&self.central);

        out.write_all(b"PK\x05\x06").unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(self.count).unwrap();
        out.write_u16::<LittleEndian>(self.count).unwrap();
        out.write_u32::<LittleEndian>(self.central.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.write_all(&self.comment).unwrap();
        out
    }

    pub fn write_to(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.finish()).unwrap();
        path
    }
}

pub fn deflate(content: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

/// Quoted ETag the server derives for `content`.
pub fn etag_of(content: &[u8]) -> String {
    let mut crc = flate2::Crc::new();
    crc.update(content);
    format!("\"{:x}{:x}\"", content.len(), crc.sum())
}

/// Text large enough to span several inflate chunks.
pub fn lorem() -> Vec<u8> {
    (0..4000)
        .map(|i| format!("{i:05} lorem ipsum dolor sit amet, consectetur adipiscing elit\n"))
        .collect::<String>()
        .into_bytes()
}

pub fn circle_png() -> Vec<u8> {
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.extend((0..2000u32).map(|i| (i * 31 % 251) as u8));
    png
}

/// The site most serving tests run against.
pub fn site() -> ZipBuilder {
    ZipBuilder::new()
        .deflated("index.html", INDEX_HTML)
        .deflated("test.html", TEST_HTML)
        .deflated("lorem.txt", lorem())
        .stored("img/circle.png", circle_png())
        .stored("blank.txt", "")
        .deflated("docs/guide/index.html", "<p>guide</p>")
        .dir("empty")
        .comment("built for zipserve tests")
}

/// Start serving on an ephemeral port; returns the base URL without trailing slash.
pub async fn spawn(server: FileServer) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server.into_router()).await.unwrap();
    });
    format!("http://{addr}")
}

/// Mount `archive` and serve it with `config`.
pub async fn serve_archive(archive: &Path, config: ServeConfig) -> (String, Arc<MountRegistry>) {
    let registry = Arc::new(MountRegistry::new());
    registry.mount(archive.to_str().unwrap()).await.unwrap();
    let url = spawn(FileServer::new(Arc::clone(&registry), config)).await;
    (url, registry)
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
