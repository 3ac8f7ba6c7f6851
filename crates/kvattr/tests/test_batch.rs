mod common;

use common::{ops, primary, Post};
use kvattr::load_many;
use kvattr::prelude::*;

fn seeded_posts(count: usize) -> Vec<Post> {
    (0..count)
        .map(|i| {
            let mut post = Post::create();
            post.update_attrs(vec![("name", format!("post-{}", i))]).unwrap();
            Post::with_id(post.id.unwrap())
        })
        .collect()
}

#[test]
fn test_load_many_single_round_trip() {
    let mut posts = seeded_posts(3);
    primary().insert(posts[1].key("version"), "7");

    load_many(&mut posts, &["name", "version"]).unwrap();

    // Every record was served by the same MGET
    let first = primary().commands_touching(&posts[0].prefix());
    let last_cmd = first.last().unwrap().clone();
    assert_eq!(last_cmd.op, "MGET");
    assert_eq!(last_cmd.keys.len(), 6);
    for post in &posts {
        let seen = primary().commands_touching(&post.prefix());
        assert_eq!(seen.last(), Some(&last_cmd));
    }

    // Loaded values are served from the cache
    for (i, post) in posts.iter_mut().enumerate() {
        let before = ops(&primary(), &post.prefix()).len();
        assert_eq!(post.get_string("name").unwrap(), Some(format!("post-{}", i)));
        let expected_version = if i == 1 { 7 } else { 1 };
        assert_eq!(post.get_int("version").unwrap(), Some(expected_version));
        assert_eq!(ops(&primary(), &post.prefix()).len(), before);
    }
}

#[test]
fn test_load_many_matches_single_getters() {
    let mut batch = seeded_posts(2);
    let mut single: Vec<Post> = batch.iter().map(|p| Post::with_id(p.id.unwrap())).collect();

    load_many(&mut batch, &["name", "title", "default_title", "int_version"]).unwrap();

    for (b, s) in batch.iter_mut().zip(single.iter_mut()) {
        for field in ["name", "title", "default_title", "int_version"] {
            assert_eq!(b.get_attr(field).unwrap(), s.get_attr(field).unwrap());
        }
    }
}

#[test]
fn test_load_many_skips_undeclared_fields() {
    let mut posts = seeded_posts(2);

    load_many(&mut posts, &["name", "no_such_field"]).unwrap();

    let cmd = primary().commands_touching(&posts[0].prefix()).pop().unwrap();
    assert_eq!(cmd.op, "MGET");
    assert_eq!(cmd.keys.len(), 2);
    assert!(cmd.keys.iter().all(|k| k.ends_with(":name")));
    assert!(!posts[0].attr_cache().is_loaded("no_such_field"));
}

#[test]
fn test_load_many_without_work_issues_no_call() {
    let mut posts = seeded_posts(1);
    let before = ops(&primary(), &posts[0].prefix()).len();

    load_many(&mut posts, &[]).unwrap();
    load_many(&mut posts, &["bogus"]).unwrap();
    let mut empty: Vec<Post> = Vec::new();
    assert!(load_many(&mut empty, &["name"]).unwrap().is_empty());

    assert_eq!(ops(&primary(), &posts[0].prefix()).len(), before);
}

#[test]
fn test_load_attrs_chains() {
    let mut posts = seeded_posts(2);

    let loaded = posts.load_attrs(&["name"]).unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(loaded.iter().all(|p| p.attr_cache().is_loaded("name")));
}

#[test]
fn test_load_many_discards_pending_changes() {
    let mut posts = seeded_posts(1);
    posts[0].set_attr("name", "local edit").unwrap();

    load_many(&mut posts, &["name"]).unwrap();

    assert!(!posts[0].attr_changed("name"));
    assert_eq!(posts[0].get_string("name").unwrap(), Some("post-0".to_string()));
}

#[test]
fn test_load_many_mixes_saved_and_unsaved_records() {
    let mut posts = seeded_posts(1);
    posts.push(Post::new());

    load_many(&mut posts, &["name", "version"]).unwrap();

    let cmd = primary().commands_touching(&posts[0].prefix()).pop().unwrap();
    assert_eq!(cmd.op, "MGET");
    assert_eq!(cmd.keys, vec![posts[0].key("name"), posts[0].key("version")]);

    assert_eq!(posts[0].get_string("name").unwrap(), Some("post-0".to_string()));
    let mut single = Post::new();
    for field in ["name", "version"] {
        assert_eq!(posts[1].get_attr(field).unwrap(), single.get_attr(field).unwrap());
    }
    assert_eq!(posts[1].get_int("version").unwrap(), Some(1));
}

#[test]
fn test_load_many_unsaved_records_take_fallbacks() {
    let mut posts = vec![Post::new(), Post::new()];
    posts[1].set_attr("default_title", "draft").unwrap();

    load_many(&mut posts, &["default_title", "int_version"]).unwrap();

    for post in posts.iter_mut() {
        assert!(!post.attr_changed("default_title"));
        assert_eq!(post.get_string("default_title").unwrap(), Some("Untitled".to_string()));
        assert_eq!(post.get_int("int_version").unwrap(), Some(0));
    }
}
