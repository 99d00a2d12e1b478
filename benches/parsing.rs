use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use emlshell::{EmlMessage, PartNode};

fn read_fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn bench_parse_tree(c: &mut Criterion) {
    let raw = read_fixture("attachment.eml");

    c.bench_function("parse_tree_attachment", |b| {
        b.iter(|| PartNode::parse(&raw).unwrap().walk().count())
    });
}

fn bench_message_bodies(c: &mut Criterion) {
    let raw = read_fixture("inline_image.eml");

    c.bench_function("message_text_and_html", |b| {
        b.iter(|| {
            let msg = EmlMessage::parse(&raw).unwrap();
            (msg.text(), msg.html(), msg.inline_images().len())
        })
    });
}

fn bench_wide_multipart(c: &mut Criterion) {
    let mut raw = String::from("Content-Type: multipart/mixed; boundary=B\n\n");
    for i in 0..500 {
        raw.push_str(&format!(
            "--B\nContent-Type: text/plain; charset=iso-8859-1\nContent-Transfer-Encoding: quoted-printable\n\npart {i} caf=E9\n"
        ));
    }
    raw.push_str("--B--\n");

    c.bench_function("parse_500_parts", |b| {
        b.iter(|| PartNode::parse(raw.as_bytes()).unwrap().children().len())
    });
}

criterion_group!(
    benches,
    bench_parse_tree,
    bench_message_bodies,
    bench_wide_multipart
);
criterion_main!(benches);
