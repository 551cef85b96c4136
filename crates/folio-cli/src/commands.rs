//! Subcommands and their execution against a [`ContentService`].

use std::io::Write;

use anyhow::Context as _;
use clap::{Args, Subcommand};
use folio_content::{CacheBackend, ContentService};
use folio_core::{
  ContentState,
  comment::{CommentPatch, NewComment},
  post::{LocalId, NewPost, PostPatch},
  store::{CommentStore, PostStore, TagStore},
  tag::TagId,
};
use serde::Serialize;
use uuid::Uuid;

// ─── Arguments ───────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Print the partition that owns a post.
  Shard { uuid: Uuid },
  /// Manage the tag catalog.
  #[command(subcommand)]
  Tag(TagCommand),
  /// Manage posts and their tag links.
  #[command(subcommand)]
  Post(PostCommand),
  /// Manage comments under a post.
  #[command(subcommand)]
  Comment(CommentCommand),
}

#[derive(Args, Debug, Clone, Copy)]
pub struct Page {
  #[arg(long, default_value_t = 0)]
  pub offset: u32,
  #[arg(long, default_value_t = 50)]
  pub limit:  u32,
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
  Create { name: String },
  Rename { id: TagId, name: String },
  Get { id: TagId },
  List {
    #[command(flatten)]
    page: Page,
  },
}

#[derive(Subcommand, Debug)]
pub enum PostCommand {
  Create {
    #[arg(long)]
    author:  Uuid,
    #[arg(long)]
    topic:   String,
    #[arg(long)]
    preview: String,
    #[arg(long)]
    text:    String,
  },
  /// The full post with its tags.
  Get { uuid: Uuid },
  /// The preview rendering: no full text.
  Preview { uuid: Uuid },
  /// Posts stored on one partition, in insertion order.
  List {
    partition: usize,
    #[command(flatten)]
    page:      Page,
  },
  Update {
    uuid:    Uuid,
    #[arg(long)]
    author:  Option<Uuid>,
    #[arg(long)]
    topic:   Option<String>,
    #[arg(long)]
    preview: Option<String>,
    #[arg(long)]
    text:    Option<String>,
    /// NEW, ON_MODERATION, PUBLISHED or BLOCKED.
    #[arg(long)]
    state:   Option<ContentState>,
  },
  Delete { uuid: Uuid },
  AssignTags {
    uuid: Uuid,
    #[arg(required = true)]
    tags: Vec<TagId>,
  },
  RemoveTags {
    uuid: Uuid,
    #[arg(required = true)]
    tags: Vec<TagId>,
  },
  ClearTags { uuid: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum CommentCommand {
  Create {
    post:     Uuid,
    #[arg(long)]
    author:   Uuid,
    #[arg(long)]
    text:     String,
    /// Local id of the comment this one replies to.
    #[arg(long)]
    reply_to: Option<LocalId>,
  },
  Get { post: Uuid, comment: Uuid },
  List {
    post: Uuid,
    #[command(flatten)]
    page: Page,
  },
  Update {
    post:     Uuid,
    comment:  Uuid,
    #[arg(long)]
    author:   Option<Uuid>,
    #[arg(long)]
    text:     Option<String>,
    #[arg(long)]
    reply_to: Option<LocalId>,
    #[arg(long)]
    state:    Option<ContentState>,
  },
  Delete { post: Uuid, comment: Uuid },
}

// ─── Execution ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Shard {
  uuid:      Uuid,
  bucket:    u32,
  partition: usize,
}

#[derive(Serialize)]
struct Done {
  ok: bool,
}

const DONE: Done = Done { ok: true };

/// Run `command` and write its result to `out` as pretty JSON.
pub async fn run<S, C>(
  command: Command,
  service: &ContentService<S, C>,
  bucket_of: impl Fn(&Uuid) -> u32,
  out: &mut impl Write,
) -> anyhow::Result<()>
where
  S: PostStore + CommentStore + TagStore,
  C: CacheBackend,
{
  match command {
    Command::Shard { uuid } => {
      let partition = service.shard(uuid)?;
      emit(out, &Shard { uuid, bucket: bucket_of(&uuid), partition })
    }
    Command::Tag(cmd) => run_tag(cmd, service, out).await,
    Command::Post(cmd) => run_post(cmd, service, out).await,
    Command::Comment(cmd) => run_comment(cmd, service, out).await,
  }
}

async fn run_tag<S, C>(
  command: TagCommand,
  service: &ContentService<S, C>,
  out: &mut impl Write,
) -> anyhow::Result<()>
where
  S: PostStore + CommentStore + TagStore,
  C: CacheBackend,
{
  match command {
    TagCommand::Create { name } => emit(out, &service.create_tag(name).await?),
    TagCommand::Rename { id, name } => {
      service.rename_tag(id, name).await?;
      emit(out, &DONE)
    }
    TagCommand::Get { id } => emit(out, &service.get_tag(id).await?),
    TagCommand::List { page } => {
      emit(out, &service.list_tags(page.offset, page.limit).await?)
    }
  }
}

async fn run_post<S, C>(
  command: PostCommand,
  service: &ContentService<S, C>,
  out: &mut impl Write,
) -> anyhow::Result<()>
where
  S: PostStore + CommentStore + TagStore,
  C: CacheBackend,
{
  match command {
    PostCommand::Create { author, topic, preview, text } => {
      let post = service
        .create_post(NewPost {
          author_id: author,
          text,
          preview_text: preview,
          topic,
        })
        .await?;
      emit(out, &post)
    }
    PostCommand::Get { uuid } => emit(out, &service.get_post_with_tags(uuid).await?),
    PostCommand::Preview { uuid } => emit(out, &service.get_post_preview(uuid).await?),
    PostCommand::List { partition, page } => emit(
      out,
      &service.list_posts(partition, page.offset, page.limit).await?,
    ),
    PostCommand::Update { uuid, author, topic, preview, text, state } => {
      let patch = PostPatch {
        author_id: author,
        text,
        preview_text: preview,
        topic,
        state,
      };
      if patch.is_empty() {
        anyhow::bail!("nothing to update; pass at least one field");
      }
      service.update_post(uuid, patch).await?;
      emit(out, &DONE)
    }
    PostCommand::Delete { uuid } => {
      service.delete_post(uuid).await?;
      emit(out, &DONE)
    }
    PostCommand::AssignTags { uuid, tags } => {
      service.assign_tags(uuid, tags).await?;
      emit(out, &DONE)
    }
    PostCommand::RemoveTags { uuid, tags } => {
      service.remove_tags(uuid, tags).await?;
      emit(out, &DONE)
    }
    PostCommand::ClearTags { uuid } => {
      service.clear_tags(uuid).await?;
      emit(out, &DONE)
    }
  }
}

async fn run_comment<S, C>(
  command: CommentCommand,
  service: &ContentService<S, C>,
  out: &mut impl Write,
) -> anyhow::Result<()>
where
  S: PostStore + CommentStore + TagStore,
  C: CacheBackend,
{
  match command {
    CommentCommand::Create { post, author, text, reply_to } => {
      let comment = service
        .create_comment(post, NewComment {
          author_id: author,
          text,
          linked_comment_id: reply_to,
        })
        .await?;
      emit(out, &comment)
    }
    CommentCommand::Get { post, comment } => {
      emit(out, &service.get_comment(post, comment).await?)
    }
    CommentCommand::List { post, page } => emit(
      out,
      &service.list_comments(post, page.offset, page.limit).await?,
    ),
    CommentCommand::Update { post, comment, author, text, reply_to, state } => {
      let patch = CommentPatch {
        author_id: author,
        text,
        linked_comment_id: reply_to,
        state,
      };
      service.update_comment(post, comment, patch).await?;
      emit(out, &DONE)
    }
    CommentCommand::Delete { post, comment } => {
      service.delete_comment(post, comment).await?;
      emit(out, &DONE)
    }
  }
}

fn emit<T: Serialize>(out: &mut impl Write, value: &T) -> anyhow::Result<()> {
  serde_json::to_writer_pretty(&mut *out, value).context("failed to encode output")?;
  writeln!(out).context("failed to write output")?;
  Ok(())
}
