//! Integration tests for `SqliteCluster` against in-memory partitions.

use std::{collections::HashSet, time::Duration};

use folio_core::{
  ContentState, Entity, Error,
  comment::{CommentPatch, NewComment},
  post::{NewPost, PostPatch},
  routing::ShardRouter,
  store::{CommentStore, PostStore, TagStore},
};
use uuid::Uuid;

use crate::{
  Partition, SqliteCluster,
  partition::CommitGate,
  schema::{POSTS_SCHEMA, TAGS_SCHEMA},
  tags::RESOLVE_CHUNK,
};

const PARTITIONS: usize = 4;

async fn cluster() -> SqliteCluster {
  SqliteCluster::open_in_memory(PARTITIONS, 64)
    .await
    .expect("in-memory cluster")
}

fn new_post(topic: &str) -> NewPost {
  NewPost {
    author_id:    Uuid::new_v4(),
    text:         format!("full text about {topic}"),
    preview_text: format!("preview of {topic}"),
    topic:        topic.into(),
  }
}

fn new_comment(text: &str) -> NewComment {
  NewComment {
    author_id:         Uuid::new_v4(),
    text:              text.into(),
    linked_comment_id: None,
  }
}

fn state_patch(state: ContentState) -> PostPatch {
  PostPatch { state: Some(state), ..Default::default() }
}

async fn all_posts(c: &SqliteCluster) -> Vec<folio_core::post::Post> {
  let mut out = Vec::new();
  for p in 0..c.partition_count() {
    out.extend(c.list_posts(p, 0, 1000).await.unwrap());
  }
  out
}

// ─── Cluster ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn from_parts_rejects_mismatched_partition_count() {
  let router = ShardRouter::uniform(16, 3).unwrap();
  let partitions = vec![
    Partition::open_in_memory(0, POSTS_SCHEMA).await.unwrap(),
    Partition::open_in_memory(1, POSTS_SCHEMA).await.unwrap(),
  ];
  let tags = Partition::open_in_memory(0, TAGS_SCHEMA).await.unwrap();

  let result = SqliteCluster::from_parts(router, partitions, tags);
  assert!(matches!(
    result,
    Err(crate::Error::Core(Error::Routing { index: 3, count: 2 }))
  ));
}

#[tokio::test]
async fn from_parts_rejects_out_of_order_partitions() {
  let router = ShardRouter::uniform(16, 2).unwrap();
  let partitions = vec![
    Partition::open_in_memory(1, POSTS_SCHEMA).await.unwrap(),
    Partition::open_in_memory(0, POSTS_SCHEMA).await.unwrap(),
  ];
  let tags = Partition::open_in_memory(0, TAGS_SCHEMA).await.unwrap();

  let result = SqliteCluster::from_parts(router, partitions, tags);
  assert!(matches!(
    result,
    Err(crate::Error::MisplacedPartition { index: 1, position: 0 })
  ));
}

// ─── Posts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_post() {
  let c = cluster().await;
  let input = new_post("rust");

  let post = c.create_post(input.clone()).await.unwrap();
  assert_eq!(post.state, ContentState::New);
  assert_eq!(post.created_at, post.updated_at);
  assert_eq!(post.author_id, input.author_id);

  let fetched = c.get_post(post.uuid).await.unwrap();
  assert_eq!(fetched, post);
}

#[tokio::test]
async fn post_lands_on_its_routed_partition() {
  let c = cluster().await;
  let post = c.create_post(new_post("routing")).await.unwrap();
  let home = c.partition_of(post.uuid).unwrap();

  for p in 0..PARTITIONS {
    let listed = c.list_posts(p, 0, 100).await.unwrap();
    let here = listed.iter().any(|x| x.uuid == post.uuid);
    assert_eq!(here, p == home, "partition {p}");
  }
}

#[tokio::test]
async fn get_missing_post_is_not_found() {
  let c = cluster().await;
  let err = c.get_post(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: Entity::Post, .. }));
}

#[tokio::test]
async fn partial_update_keeps_untouched_fields() {
  let c = cluster().await;
  let post = c.create_post(new_post("before")).await.unwrap();

  c.update_post(post.uuid, PostPatch {
    topic: Some("after".into()),
    ..Default::default()
  })
  .await
  .unwrap();

  let fetched = c.get_post(post.uuid).await.unwrap();
  assert_eq!(fetched.topic, "after");
  assert_eq!(fetched.text, post.text);
  assert_eq!(fetched.preview_text, post.preview_text);
  assert_eq!(fetched.author_id, post.author_id);
  assert_eq!(fetched.state, ContentState::New);
  assert_eq!(fetched.created_at, post.created_at);
  assert!(fetched.updated_at >= post.updated_at);
}

#[tokio::test]
async fn moderation_flow_is_enforced() {
  let c = cluster().await;
  let post = c.create_post(new_post("flow")).await.unwrap();

  let skip = c.update_post(post.uuid, state_patch(ContentState::Published)).await;
  assert!(matches!(skip, Err(Error::InvalidState(_))));

  c.update_post(post.uuid, state_patch(ContentState::OnModeration)).await.unwrap();
  c.update_post(post.uuid, state_patch(ContentState::Published)).await.unwrap();

  let back = c.update_post(post.uuid, state_patch(ContentState::OnModeration)).await;
  assert!(matches!(back, Err(Error::InvalidState(_))));

  c.update_post(post.uuid, state_patch(ContentState::Blocked)).await.unwrap();
  assert_eq!(c.get_post(post.uuid).await.unwrap().state, ContentState::Blocked);
}

#[tokio::test]
async fn rejected_transition_leaves_fields_untouched() {
  let c = cluster().await;
  let post = c.create_post(new_post("unchanged")).await.unwrap();

  let result = c
    .update_post(post.uuid, PostPatch {
      text: Some("should not land".into()),
      state: Some(ContentState::Published),
      ..Default::default()
    })
    .await;
  assert!(matches!(result, Err(Error::InvalidState(_))));
  assert_eq!(c.get_post(post.uuid).await.unwrap().text, post.text);
}

#[tokio::test]
async fn update_cannot_delete() {
  let c = cluster().await;
  let post = c.create_post(new_post("x")).await.unwrap();

  let err = c.update_post(post.uuid, state_patch(ContentState::Deleted)).await;
  assert!(matches!(err, Err(Error::InvalidState(_))));
  assert_eq!(c.get_post(post.uuid).await.unwrap().state, ContentState::New);
}

#[tokio::test]
async fn delete_hides_post_and_is_not_repeatable() {
  let c = cluster().await;
  let post = c.create_post(new_post("gone")).await.unwrap();

  c.delete_post(post.uuid).await.unwrap();

  assert!(c.get_post(post.uuid).await.unwrap_err().is_not_found());
  assert!(c.delete_post(post.uuid).await.unwrap_err().is_not_found());
  let update = c
    .update_post(post.uuid, PostPatch {
      text: Some("revive".into()),
      ..Default::default()
    })
    .await;
  assert!(update.unwrap_err().is_not_found());
  assert!(all_posts(&c).await.iter().all(|p| p.uuid != post.uuid));
}

#[tokio::test]
async fn update_missing_post_is_not_found() {
  let c = cluster().await;
  let err = c
    .update_post(Uuid::new_v4(), state_patch(ContentState::Blocked))
    .await
    .unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn list_posts_pages_by_local_id() {
  let c = cluster().await;
  for i in 0..20 {
    c.create_post(new_post(&format!("topic {i}"))).await.unwrap();
  }

  let mut seen = HashSet::new();
  for p in 0..PARTITIONS {
    let all = c.list_posts(p, 0, 100).await.unwrap();
    assert!(all.windows(2).all(|w| w[0].id < w[1].id));

    let first = c.list_posts(p, 0, 2).await.unwrap();
    let rest = c.list_posts(p, 2, 100).await.unwrap();
    assert_eq!(first.len() + rest.len(), all.len());
    assert_eq!(first.iter().chain(&rest).cloned().collect::<Vec<_>>(), all);

    seen.extend(all.into_iter().map(|post| post.uuid));
  }
  assert_eq!(seen.len(), 20);
}

#[tokio::test]
async fn list_posts_rejects_unknown_partition() {
  let c = cluster().await;
  let err = c.list_posts(PARTITIONS, 0, 10).await.unwrap_err();
  assert!(matches!(err, Error::Routing { index: PARTITIONS, count: PARTITIONS }));
}

// ─── Tag links ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn assign_and_remove_tags() {
  let c = cluster().await;
  let post = c.create_post(new_post("tagged")).await.unwrap();
  let a = c.create_tag("a".into()).await.unwrap();
  let b = c.create_tag("b".into()).await.unwrap();

  c.assign_tags(post.uuid, vec![a.id, b.id]).await.unwrap();
  // Re-linking the same set is a no-op.
  c.assign_tags(post.uuid, vec![a.id, b.id]).await.unwrap();

  let (_, ids) = c.get_post_with_tag_ids(post.uuid).await.unwrap();
  let linked: HashSet<_> = ids.iter().copied().collect();
  assert_eq!(ids.len(), 2);
  assert_eq!(linked, HashSet::from([a.id, b.id]));

  c.remove_tags(post.uuid, vec![a.id, 9999]).await.unwrap();
  let (_, ids) = c.get_post_with_tag_ids(post.uuid).await.unwrap();
  assert_eq!(ids, vec![b.id]);

  c.remove_all_tags(post.uuid).await.unwrap();
  let (_, ids) = c.get_post_with_tag_ids(post.uuid).await.unwrap();
  assert!(ids.is_empty());

  // Nothing left to remove.
  c.remove_all_tags(post.uuid).await.unwrap();
}

#[tokio::test]
async fn tag_changes_stamp_the_post() {
  let c = cluster().await;
  let post = c.create_post(new_post("stamp")).await.unwrap();
  let tag = c.create_tag("stamp".into()).await.unwrap();

  c.assign_tags(post.uuid, vec![tag.id]).await.unwrap();
  let (after, _) = c.get_post_with_tag_ids(post.uuid).await.unwrap();
  assert!(after.updated_at >= post.updated_at);
  assert_eq!(after.created_at, post.created_at);
}

#[tokio::test]
async fn links_may_dangle() {
  let c = cluster().await;
  let post = c.create_post(new_post("dangling")).await.unwrap();

  c.assign_tags(post.uuid, vec![424242]).await.unwrap();
  let (_, ids) = c.get_post_with_tag_ids(post.uuid).await.unwrap();
  assert_eq!(ids, vec![424242]);
  assert!(c.resolve_tags(ids).await.unwrap().is_empty());
}

#[tokio::test]
async fn tag_links_require_a_live_post() {
  let c = cluster().await;
  let post = c.create_post(new_post("dead")).await.unwrap();
  c.delete_post(post.uuid).await.unwrap();

  assert!(c.assign_tags(post.uuid, vec![1]).await.unwrap_err().is_not_found());
  assert!(c.remove_tags(post.uuid, vec![1]).await.unwrap_err().is_not_found());
  assert!(c.remove_all_tags(post.uuid).await.unwrap_err().is_not_found());
  assert!(c.get_post_with_tag_ids(post.uuid).await.unwrap_err().is_not_found());
}

// ─── Tags ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn tag_names_are_unique() {
  let c = cluster().await;
  let rust = c.create_tag("rust".into()).await.unwrap();
  let go = c.create_tag("go".into()).await.unwrap();

  let dup = c.create_tag("rust".into()).await;
  assert!(matches!(dup, Err(Error::DuplicateName(name)) if name == "rust"));

  let clash = c.update_tag(go.id, "rust".into()).await;
  assert!(matches!(clash, Err(Error::DuplicateName(_))));
  assert_eq!(c.get_tag(go.id).await.unwrap().name, "go");

  c.update_tag(rust.id, "rustlang".into()).await.unwrap();
  assert_eq!(c.get_tag(rust.id).await.unwrap().name, "rustlang");
  // The freed name can be taken again.
  c.create_tag("rust".into()).await.unwrap();
}

#[tokio::test]
async fn missing_tags_are_not_found() {
  let c = cluster().await;
  assert!(matches!(
    c.get_tag(7).await,
    Err(Error::NotFound { entity: Entity::Tag, .. })
  ));
  assert!(c.update_tag(7, "x".into()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn list_and_resolve_tags() {
  let c = cluster().await;
  let mut ids = Vec::new();
  for name in ["a", "b", "c", "d"] {
    ids.push(c.create_tag(name.into()).await.unwrap().id);
  }

  let page = c.list_tags(1, 2).await.unwrap();
  assert_eq!(
    page.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
    vec!["b", "c"]
  );

  let resolved = c
    .resolve_tags(vec![ids[3], ids[0], ids[3], 1_000_000])
    .await
    .unwrap();
  assert_eq!(
    resolved.iter().map(|t| t.id).collect::<Vec<_>>(),
    vec![ids[0], ids[3]]
  );
  assert!(c.resolve_tags(Vec::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn resolve_tags_handles_more_ids_than_one_statement_binds() {
  let c = cluster().await;
  let first = c.create_tag("first".into()).await.unwrap();
  let last = c.create_tag("last".into()).await.unwrap();

  let mut ids: Vec<_> = (1_000..1_000 + 3 * RESOLVE_CHUNK as i64).collect();
  ids.push(last.id);
  ids.insert(0, first.id);

  let resolved = c.resolve_tags(ids).await.unwrap();
  assert_eq!(resolved, vec![first, last]);
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn comment_lifecycle() {
  let c = cluster().await;
  let post = c.create_post(new_post("discussion")).await.unwrap();

  let first = c.create_comment(post.uuid, new_comment("first")).await.unwrap();
  assert_eq!(first.state, ContentState::New);
  assert_eq!(first.post_id, post.id);

  let reply = c
    .create_comment(post.uuid, NewComment {
      linked_comment_id: Some(first.id),
      ..new_comment("reply")
    })
    .await
    .unwrap();
  assert_eq!(reply.linked_comment_id, Some(first.id));

  assert_eq!(c.get_comment(post.uuid, first.uuid).await.unwrap(), first);

  let listed = c.list_comments(post.uuid, 0, 10).await.unwrap();
  assert_eq!(listed, vec![first.clone(), reply.clone()]);

  c.update_comment(post.uuid, first.uuid, CommentPatch {
    text: Some("edited".into()),
    state: Some(ContentState::OnModeration),
    ..Default::default()
  })
  .await
  .unwrap();
  let edited = c.get_comment(post.uuid, first.uuid).await.unwrap();
  assert_eq!(edited.text, "edited");
  assert_eq!(edited.state, ContentState::OnModeration);
  assert_eq!(edited.author_id, first.author_id);

  c.delete_comment(post.uuid, first.uuid).await.unwrap();
  assert!(c.get_comment(post.uuid, first.uuid).await.unwrap_err().is_not_found());
  assert!(c.delete_comment(post.uuid, first.uuid).await.unwrap_err().is_not_found());
  assert_eq!(c.list_comments(post.uuid, 0, 10).await.unwrap(), vec![reply]);
}

#[tokio::test]
async fn reply_links_move_but_are_never_cleared() {
  let c = cluster().await;
  let post = c.create_post(new_post("threads")).await.unwrap();
  let a = c.create_comment(post.uuid, new_comment("a")).await.unwrap();
  let b = c.create_comment(post.uuid, new_comment("b")).await.unwrap();
  let reply = c
    .create_comment(post.uuid, NewComment {
      linked_comment_id: Some(a.id),
      ..new_comment("reply")
    })
    .await
    .unwrap();

  c.update_comment(post.uuid, reply.uuid, CommentPatch {
    linked_comment_id: Some(b.id),
    ..Default::default()
  })
  .await
  .unwrap();
  let moved = c.get_comment(post.uuid, reply.uuid).await.unwrap();
  assert_eq!(moved.linked_comment_id, Some(b.id));

  c.update_comment(post.uuid, reply.uuid, CommentPatch {
    text: Some("still a reply".into()),
    ..Default::default()
  })
  .await
  .unwrap();
  let kept = c.get_comment(post.uuid, reply.uuid).await.unwrap();
  assert_eq!(kept.linked_comment_id, Some(b.id));
}

#[tokio::test]
async fn comment_transitions_are_enforced() {
  let c = cluster().await;
  let post = c.create_post(new_post("rules")).await.unwrap();
  let comment = c.create_comment(post.uuid, new_comment("hi")).await.unwrap();

  let skip = c
    .update_comment(post.uuid, comment.uuid, CommentPatch {
      state: Some(ContentState::Published),
      ..Default::default()
    })
    .await;
  assert!(matches!(skip, Err(Error::InvalidState(_))));

  let delete = c
    .update_comment(post.uuid, comment.uuid, CommentPatch {
      state: Some(ContentState::Deleted),
      ..Default::default()
    })
    .await;
  assert!(matches!(delete, Err(Error::InvalidState(_))));
}

#[tokio::test]
async fn comments_need_a_live_parent() {
  let c = cluster().await;

  let orphan = c.create_comment(Uuid::new_v4(), new_comment("nobody home")).await;
  assert!(matches!(orphan, Err(Error::NotFound { entity: Entity::Post, .. })));

  let post = c.create_post(new_post("closing")).await.unwrap();
  let comment = c.create_comment(post.uuid, new_comment("last word")).await.unwrap();
  c.delete_post(post.uuid).await.unwrap();

  assert!(c.get_comment(post.uuid, comment.uuid).await.unwrap_err().is_not_found());
  assert!(c.list_comments(post.uuid, 0, 10).await.unwrap().is_empty());
  assert!(
    c.update_comment(post.uuid, comment.uuid, CommentPatch {
      text: Some("too late".into()),
      ..Default::default()
    })
    .await
    .unwrap_err()
    .is_not_found()
  );
  assert!(c.delete_comment(post.uuid, comment.uuid).await.unwrap_err().is_not_found());
  assert!(c.create_comment(post.uuid, new_comment("again")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn comment_is_addressed_through_its_own_post() {
  let c = cluster().await;
  let post = c.create_post(new_post("one")).await.unwrap();
  let other = c.create_post(new_post("two")).await.unwrap();
  let comment = c.create_comment(post.uuid, new_comment("mine")).await.unwrap();

  assert!(c.get_comment(other.uuid, comment.uuid).await.unwrap_err().is_not_found());
}

// ─── Timeouts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn expired_transaction_is_rolled_back() {
  let c = cluster().await;
  let hurried = c.clone().with_op_timeout(Duration::from_nanos(1));

  let err = hurried.create_post(new_post("late")).await.unwrap_err();
  let Error::Persistence { entity, source, .. } = err else {
    panic!("expected a persistence error");
  };
  assert_eq!(entity, Entity::Post);
  assert!(matches!(
    source.downcast_ref::<crate::Error>(),
    Some(crate::Error::TimedOut(_))
  ));

  assert!(all_posts(&c).await.is_empty());
}

#[tokio::test]
async fn write_within_the_timeout_commits() {
  let c = cluster().await;
  let patient = c.clone().with_op_timeout(Duration::from_secs(30));

  let post = patient.create_post(new_post("on time")).await.unwrap();
  assert_eq!(c.get_post(post.uuid).await.unwrap(), post);
}

#[test]
fn commit_gate_settles_once() {
  // Commit first: the caller's timer must wait for the outcome.
  let gate = CommitGate::default();
  assert!(gate.clone().claim_commit());
  assert!(!gate.abandon());

  // Caller first: the connection thread must roll back.
  let gate = CommitGate::default();
  assert!(gate.abandon());
  assert!(!gate.clone().claim_commit());
  assert!(!gate.claim_commit());
}
