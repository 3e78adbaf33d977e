mod common;

use common::*;
use http::StatusCode;

fn dest(path: &str) -> String {
    format!("http://{HOST}{path}")
}

#[tokio::test]
async fn move_does_not_overwrite_by_default() {
    let share = Share::new();
    share.write("a.txt", "A");
    share.write("b.txt", "B");

    let r = share.call("MOVE", "/a.txt", &[("destination", &dest("/b.txt"))]).await;
    assert_eq!(r.status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(share.read("a.txt"), b"A");
    assert_eq!(share.read("b.txt"), b"B");

    let r = share
        .call("MOVE", "/a.txt", &[("destination", &dest("/b.txt")), ("overwrite", "F")])
        .await;
    assert_eq!(r.status, StatusCode::PRECONDITION_FAILED);

    let r = share
        .call("MOVE", "/a.txt", &[("destination", &dest("/b.txt")), ("overwrite", "T")])
        .await;
    assert_eq!(r.status, StatusCode::NO_CONTENT);
    assert!(!share.exists("a.txt"));
    assert_eq!(share.read("b.txt"), b"A");
}

#[tokio::test]
async fn move_to_new_name() {
    let share = Share::new();
    share.write("dir/a.txt", "A");
    share.write("dir/sub/b.txt", "B");
    std::fs::create_dir(share.path("other")).unwrap();

    let r = share.call("MOVE", "/dir/", &[("destination", &dest("/other/moved/"))]).await;
    assert_eq!(r.status, StatusCode::CREATED);
    assert!(!share.exists("dir"));
    assert_eq!(share.read("other/moved/a.txt"), b"A");
    assert_eq!(share.read("other/moved/sub/b.txt"), b"B");
}

#[tokio::test]
async fn copy_overwrites_by_default() {
    let share = Share::new();
    share.write("a.txt", "A");
    share.write("b.txt", "B");

    let r = share.call("COPY", "/a.txt", &[("destination", &dest("/b.txt"))]).await;
    assert_eq!(r.status, StatusCode::NO_CONTENT);
    assert_eq!(share.read("a.txt"), b"A");
    assert_eq!(share.read("b.txt"), b"A");

    let r = share
        .call("COPY", "/a.txt", &[("destination", &dest("/b.txt")), ("overwrite", "F")])
        .await;
    assert_eq!(r.status, StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn copy_tree() {
    let share = Share::new();
    share.write("src/a.txt", data(100));
    share.write("src/x/b.txt", data(2000));
    share.write("src/x/y/c.txt", "");
    std::fs::create_dir(share.path("src/empty")).unwrap();

    let r = share
        .call("COPY", "/src/", &[("destination", &dest("/dst/")), ("depth", "infinity")])
        .await;
    assert_eq!(r.status, StatusCode::CREATED);
    assert_eq!(tree_files(&share.path("src")), tree_files(&share.path("dst")));
    assert_eq!(share.read("src/x/b.txt"), data(2000));
}

#[tokio::test]
async fn copy_replaces_a_directory() {
    let share = Share::new();
    share.write("a.txt", "A");
    share.write("b/old.txt", "old");

    let r = share.call("COPY", "/a.txt", &[("destination", &dest("/b"))]).await;
    assert_eq!(r.status, StatusCode::NO_CONTENT);
    assert_eq!(share.read("b"), b"A");
}

#[tokio::test]
async fn copy_depth_zero_is_refused() {
    let share = Share::new();
    share.write("src/a.txt", "A");

    let r = share
        .call("COPY", "/src/", &[("destination", &dest("/dst/")), ("depth", "0")])
        .await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert!(!share.exists("dst"));
}

#[tokio::test]
async fn bad_destinations() {
    let share = Share::new();
    share.write("a.txt", "A");
    share.write("dir/b.txt", "B");

    let r = share.call("MOVE", "/a.txt", &[]).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);

    let r = share
        .call("MOVE", "/a.txt", &[("destination", "http://elsewhere.example/b.txt")])
        .await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);

    let r = share.call("COPY", "/a.txt", &[("destination", "not a url")]).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);

    let r = share.call("MOVE", "/a.txt", &[("destination", &dest("/../escape.txt"))]).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);

    let r = share.call("MOVE", "/a.txt", &[("destination", &dest("/no/such/dir/a.txt"))]).await;
    assert_eq!(r.status, StatusCode::CONFLICT);

    let r = share.call("COPY", "/a.txt", &[("destination", &dest("/a.txt"))]).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);

    let r = share.call("COPY", "/dir/", &[("destination", &dest("/dir/inner/"))]).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);

    let r = share.call("MOVE", "/nope.txt", &[("destination", &dest("/b.txt"))]).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);

    // nothing moved.
    assert_eq!(share.read("a.txt"), b"A");
    assert_eq!(tree_files(&share.path("dir")), vec![("b.txt".to_string(), b"B".to_vec())]);
}

#[tokio::test]
async fn destination_above_the_source() {
    let share = Share::new();
    share.write("dir/keep.txt", "K");
    share.write("dir/sub/a.txt", "A");

    // COPY overwrites by default.
    let r = share.call("COPY", "/dir/sub/a.txt", &[("destination", &dest("/dir"))]).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);

    let r = share
        .call("MOVE", "/dir/sub/", &[("destination", &dest("/dir/")), ("overwrite", "T")])
        .await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);

    let r = share
        .call("COPY", "/dir/sub/a.txt", &[("destination", &dest("/")), ("overwrite", "T")])
        .await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);

    assert_eq!(
        tree_files(&share.path("dir")),
        vec![
            ("keep.txt".to_string(), b"K".to_vec()),
            ("sub/".to_string(), Vec::new()),
            ("sub/a.txt".to_string(), b"A".to_vec()),
        ]
    );
}

#[tokio::test]
async fn host_comparison_ignores_case() {
    let share = Share::new();
    share.write("a.txt", "A");

    let r = share
        .call("COPY", "/a.txt", &[("destination", "http://LOCALHOST:8080/c.txt")])
        .await;
    assert_eq!(r.status, StatusCode::CREATED);
    assert_eq!(share.read("c.txt"), b"A");
}

#[tokio::test]
async fn destination_outside_prefix() {
    let share = Share::with(|b| b.strip_prefix("/dav"));
    share.write("a.txt", "A");

    let r = share.call("COPY", "/dav/a.txt", &[("destination", &dest("/elsewhere/a.txt"))]).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);

    let r = share.call("COPY", "/dav/a.txt", &[("destination", &dest("/dav/b%20c.txt"))]).await;
    assert_eq!(r.status, StatusCode::CREATED);
    assert_eq!(share.read("b c.txt"), b"A");
}

#[tokio::test]
async fn move_of_root_is_forbidden() {
    let share = Share::new();
    std::fs::create_dir(share.path("x")).unwrap();
    let r = share.call("MOVE", "/", &[("destination", &dest("/x/root/"))]).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);
}
