mod common;

use common::*;
use http::StatusCode;

#[tokio::test]
async fn full_get() {
    let share = Share::new();
    share.write("a.txt", data(1000));

    let r = share.call("GET", "/a.txt", &[]).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(&r.body[..], &data(1000)[..]);
    assert_eq!(r.header("content-length"), Some("1000"));
    assert_eq!(r.header("content-type"), Some("text/plain"));
    assert_eq!(r.header("accept-ranges"), Some("bytes"));
    assert!(r.header("etag").is_some());
    assert!(r.header("last-modified").is_some());
}

#[tokio::test]
async fn small_read_buffer_streams_everything() {
    let share = Share::with(|b| b.read_buf_size(7));
    share.write("a.bin", data(1000));

    let r = share.call("GET", "/a.bin", &[]).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(&r.body[..], &data(1000)[..]);
    assert_eq!(r.header("content-type"), Some("application/octet-stream"));
}

#[tokio::test]
async fn range_first_hundred_bytes() {
    let share = Share::new();
    share.write("a.txt", data(1000));

    let r = share.call("GET", "/a.txt", &[("range", "bytes=0-99")]).await;
    assert_eq!(r.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(r.header("content-range"), Some("bytes 0-99/1000"));
    assert_eq!(r.header("content-length"), Some("100"));
    assert_eq!(&r.body[..], &data(1000)[..100]);
}

#[tokio::test]
async fn range_in_the_middle_and_at_the_end() {
    let share = Share::with(|b| b.read_buf_size(64));
    share.write("a.txt", data(1000));

    let r = share.call("GET", "/a.txt", &[("range", "bytes=500-")]).await;
    assert_eq!(r.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(r.header("content-range"), Some("bytes 500-999/1000"));
    assert_eq!(&r.body[..], &data(1000)[500..]);

    let r = share.call("GET", "/a.txt", &[("range", "bytes=-10")]).await;
    assert_eq!(r.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(r.header("content-range"), Some("bytes 990-999/1000"));
    assert_eq!(&r.body[..], &data(1000)[990..]);

    let r = share.call("GET", "/a.txt", &[("range", "bytes=900-5000")]).await;
    assert_eq!(r.header("content-range"), Some("bytes 900-999/1000"));
    assert_eq!(r.body.len(), 100);
}

#[tokio::test]
async fn range_past_end() {
    let share = Share::new();
    share.write("a.txt", data(1000));

    let r = share.call("GET", "/a.txt", &[("range", "bytes=2000-")]).await;
    assert_eq!(r.status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(r.header("content-range"), Some("bytes */1000"));
    assert!(r.body.is_empty());
}

#[tokio::test]
async fn malformed_range_gets_everything() {
    let share = Share::new();
    share.write("a.txt", data(1000));

    let r = share.call("GET", "/a.txt", &[("range", "bytes=zz")]).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body.len(), 1000);
}

#[tokio::test]
async fn etag_is_stable_until_the_file_changes() {
    let share = Share::new();
    share.write("a.txt", data(1000));

    let first = share.call("GET", "/a.txt", &[]).await;
    let second = share.call("HEAD", "/a.txt", &[]).await;
    let etag = first.header("etag").unwrap().to_string();
    assert_eq!(second.header("etag"), Some(etag.as_str()));
    assert!(etag.starts_with('"') && etag.ends_with('"'));

    share.write("a.txt", data(1001));
    let third = share.call("GET", "/a.txt", &[]).await;
    assert_ne!(third.header("etag"), Some(etag.as_str()));
}

#[tokio::test]
async fn if_none_match() {
    let share = Share::new();
    share.write("a.txt", data(1000));
    let etag = share.call("HEAD", "/a.txt", &[]).await.header("etag").unwrap().to_string();

    let r = share.call("GET", "/a.txt", &[("if-none-match", &etag)]).await;
    assert_eq!(r.status, StatusCode::NOT_MODIFIED);
    assert!(r.body.is_empty());

    let r = share.call("GET", "/a.txt", &[("if-none-match", "*")]).await;
    assert_eq!(r.status, StatusCode::NOT_MODIFIED);

    let r = share.call("GET", "/a.txt", &[("if-none-match", "\"0000\"")]).await;
    assert_eq!(r.status, StatusCode::OK);
}

#[tokio::test]
async fn if_range() {
    let share = Share::new();
    share.write("a.txt", data(1000));
    let etag = share.call("HEAD", "/a.txt", &[]).await.header("etag").unwrap().to_string();

    let r = share
        .call("GET", "/a.txt", &[("range", "bytes=0-9"), ("if-range", &etag)])
        .await;
    assert_eq!(r.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(r.body.len(), 10);

    let r = share
        .call("GET", "/a.txt", &[("range", "bytes=0-9"), ("if-range", "\"stale\"")])
        .await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body.len(), 1000);
}

#[tokio::test]
async fn head_has_no_body() {
    let share = Share::new();
    share.write("a.txt", data(1000));

    let r = share.call("HEAD", "/a.txt", &[]).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.header("content-length"), Some("1000"));
    assert!(r.body.is_empty());
}

#[tokio::test]
async fn get_missing_file() {
    let share = Share::new();
    let r = share.call("GET", "/nope.txt", &[]).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_directory() {
    let share = Share::new();
    share.write("dir/a.txt", "x");

    let r = share.call("GET", "/dir/", &[]).await;
    assert_eq!(r.status, StatusCode::OK);
    assert!(r.body.is_empty());
}

#[tokio::test]
async fn autoindex() {
    let share = Share::with(|b| b.autoindex(true));
    share.write("dir/a <b>.txt", "x");
    std::fs::create_dir(share.path("dir/sub")).unwrap();

    let r = share.call("GET", "/dir", &[]).await;
    assert_eq!(r.status, StatusCode::FOUND);
    assert_eq!(r.header("location"), Some("/dir/"));

    let r = share.call("GET", "/dir/", &[]).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.header("content-type"), Some("text/html; charset=utf-8"));
    let html = r.text();
    assert!(html.contains("<a href=\"a%20%3Cb%3E.txt\">a &lt;b&gt;.txt</a>"));
    assert!(html.contains("<a href=\"sub/\">sub/</a>"));
    // directories first.
    assert!(html.find("sub/").unwrap() < html.find("a%20").unwrap());
}

#[tokio::test]
async fn traversal_is_forbidden_for_every_method() {
    let share = Share::new();
    for method in ["GET", "HEAD", "PUT", "DELETE", "PROPFIND", "MKCOL", "COPY", "MOVE", "OPTIONS"] {
        for uri in ["/../secret", "/a/../../secret", "/%2e%2e/secret", "/a/%2E%2E/b"] {
            let r = share.call(method, uri, &[("depth", "0")]).await;
            assert_eq!(r.status, StatusCode::FORBIDDEN, "{method} {uri}");
        }
    }
    assert!(!share.dir.path().parent().unwrap().join("secret").exists());
}
