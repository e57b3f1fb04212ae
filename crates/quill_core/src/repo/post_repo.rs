//! Blog post repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `blog_posts` with owner-scoped writes.
//!
//! # Invariants
//! - `update_owned_post` and `delete_owned_post` apply the ownership check
//!   and the write in one conditional statement inside an immediate
//!   transaction; a concurrent writer cannot slip between them.
//! - Lists are ordered by ascending id.

use crate::model::blog_post::{BlogPost, BlogPostId, BlogPostPatch, NewBlogPost};
use crate::model::user::UserId;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const POST_SELECT_SQL: &str = "SELECT
    id,
    title,
    sub_title,
    body,
    user_id
FROM blog_posts";

const ENTITY: &str = "blog post";

/// Repository interface for blog post CRUD operations.
pub trait BlogPostRepository {
    fn create_post(&self, owner: UserId, post: &NewBlogPost) -> RepoResult<BlogPost>;
    fn get_post(&self, id: BlogPostId) -> RepoResult<Option<BlogPost>>;
    fn list_posts(&self) -> RepoResult<Vec<BlogPost>>;
    fn list_posts_by_owner(&self, owner: UserId) -> RepoResult<Vec<BlogPost>>;
    /// Applies `patch` when `owner` owns post `id`; returns the stored result.
    fn update_owned_post(
        &mut self,
        id: BlogPostId,
        owner: UserId,
        patch: &BlogPostPatch,
    ) -> RepoResult<BlogPost>;
    /// Removes post `id` when `owner` owns it.
    fn delete_owned_post(&mut self, id: BlogPostId, owner: UserId) -> RepoResult<()>;
}

/// SQLite-backed blog post repository.
pub struct SqliteBlogPostRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteBlogPostRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl BlogPostRepository for SqliteBlogPostRepository<'_> {
    fn create_post(&self, owner: UserId, post: &NewBlogPost) -> RepoResult<BlogPost> {
        self.conn.execute(
            "INSERT INTO blog_posts (title, sub_title, body, user_id)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                post.title.as_str(),
                post.sub_title.as_str(),
                post.body.as_str(),
                owner
            ],
        )?;

        Ok(BlogPost {
            id: self.conn.last_insert_rowid(),
            title: post.title.clone(),
            sub_title: post.sub_title.clone(),
            body: post.body.clone(),
            user_id: owner,
        })
    }

    fn get_post(&self, id: BlogPostId) -> RepoResult<Option<BlogPost>> {
        select_post(&*self.conn, id)
    }

    fn list_posts(&self) -> RepoResult<Vec<BlogPost>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{POST_SELECT_SQL} ORDER BY id ASC;"))?;
        let posts = stmt
            .query_map([], parse_post_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    fn list_posts_by_owner(&self, owner: UserId) -> RepoResult<Vec<BlogPost>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{POST_SELECT_SQL} WHERE user_id = ?1 ORDER BY id ASC;"
        ))?;
        let posts = stmt
            .query_map([owner], parse_post_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    fn update_owned_post(
        &mut self,
        id: BlogPostId,
        owner: UserId,
        patch: &BlogPostPatch,
    ) -> RepoResult<BlogPost> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE blog_posts
             SET
                title = COALESCE(?1, title),
                sub_title = COALESCE(?2, sub_title),
                body = COALESCE(?3, body)
             WHERE id = ?4 AND user_id = ?5;",
            params![
                patch.title.as_deref(),
                patch.sub_title.as_deref(),
                patch.body.as_deref(),
                id,
                owner
            ],
        )?;
        if changed == 0 {
            return Err(miss_reason(&tx, id)?);
        }

        let post = select_post(&tx, id)?.ok_or(RepoError::NotFound { entity: ENTITY, id })?;
        tx.commit()?;
        Ok(post)
    }

    fn delete_owned_post(&mut self, id: BlogPostId, owner: UserId) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "DELETE FROM blog_posts WHERE id = ?1 AND user_id = ?2;",
            params![id, owner],
        )?;
        if changed == 0 {
            return Err(miss_reason(&tx, id)?);
        }

        tx.commit()?;
        Ok(())
    }
}

/// Explains why an owner-scoped write matched no row.
fn miss_reason(tx: &Transaction<'_>, id: BlogPostId) -> RepoResult<RepoError> {
    let exists = tx
        .query_row("SELECT 1 FROM blog_posts WHERE id = ?1;", [id], |_| Ok(()))
        .optional()?
        .is_some();

    Ok(if exists {
        RepoError::NotOwner(id)
    } else {
        RepoError::NotFound { entity: ENTITY, id }
    })
}

fn select_post(conn: &Connection, id: BlogPostId) -> RepoResult<Option<BlogPost>> {
    let post = conn
        .query_row(
            &format!("{POST_SELECT_SQL} WHERE id = ?1;"),
            [id],
            parse_post_row,
        )
        .optional()?;
    Ok(post)
}

fn parse_post_row(row: &Row<'_>) -> rusqlite::Result<BlogPost> {
    Ok(BlogPost {
        id: row.get("id")?,
        title: row.get("title")?,
        sub_title: row.get("sub_title")?,
        body: row.get("body")?,
        user_id: row.get("user_id")?,
    })
}
