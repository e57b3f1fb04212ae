use quill_core::auth::Caller;
use quill_core::db::open_db_in_memory;
use quill_core::model::user::NewUser;
use quill_core::repo::post_repo::{BlogPostRepository, SqliteBlogPostRepository};
use quill_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use quill_core::service::post_service::{BlogPostService, CreateBlogPostRequest};
use quill_core::{BlogPostPatch, RepoError, ServiceError};
use rusqlite::Connection;

fn add_user(conn: &Connection, username: &str) -> Caller {
    let user = SqliteUserRepository::new(conn)
        .create_user(
            &NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: "unused".to_string(),
            },
            0,
        )
        .unwrap();
    Caller::from(&user)
}

fn request(title: &str, sub_title: &str, body: &str) -> CreateBlogPostRequest {
    CreateBlogPostRequest {
        title: Some(title.to_string()),
        sub_title: Some(sub_title.to_string()),
        body: Some(body.to_string()),
    }
}

#[test]
fn created_post_is_owned_by_caller_and_listed_in_id_order() {
    let mut conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    let service = BlogPostService::new(SqliteBlogPostRepository::new(&mut conn));

    let first = service.create_post(&ada, request("One", "s1", "b1")).unwrap();
    let second = service.create_post(&ada, request("Two", "s2", "b2")).unwrap();
    assert_eq!(first.user_id, ada.user_id);
    assert!(second.id > first.id);

    let listed = service.list_posts(&ada).unwrap();
    let titles: Vec<&str> = listed.iter().map(|post| post.title.as_str()).collect();
    assert_eq!(titles, vec!["One", "Two"]);
    assert_eq!(service.get_post(&ada, first.id).unwrap(), first);
}

#[test]
fn create_without_a_field_is_rejected_and_stores_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    let service = BlogPostService::new(SqliteBlogPostRepository::new(&mut conn));

    let err = service
        .create_post(
            &ada,
            CreateBlogPostRequest {
                title: Some("T".into()),
                sub_title: Some("S".into()),
                body: None,
            },
        )
        .unwrap_err();
    let ServiceError::Validation(errors) = err else {
        panic!("expected validation error, got {err}");
    };
    assert_eq!(errors[0].field, "body");
    assert_eq!(errors[0].code, "required");
    assert!(service.list_posts(&ada).unwrap().is_empty());
}

#[test]
fn partial_update_keeps_omitted_and_empty_fields() {
    let mut conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    let mut service = BlogPostService::new(SqliteBlogPostRepository::new(&mut conn));
    let post = service.create_post(&ada, request("A", "B", "C")).unwrap();

    let updated = service
        .update_post(
            &ada,
            post.id,
            BlogPostPatch::new(Some("New".into()), Some(String::new()), None),
        )
        .unwrap();
    assert_eq!(updated.title, "New");
    assert_eq!(updated.sub_title, "B");
    assert_eq!(updated.body, "C");
    assert_eq!(updated.user_id, ada.user_id);
}

#[test]
fn non_owner_cannot_update_or_delete() {
    let mut conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    let bob = add_user(&conn, "bob");
    let mut service = BlogPostService::new(SqliteBlogPostRepository::new(&mut conn));
    let post = service.create_post(&ada, request("A", "B", "C")).unwrap();

    let err = service
        .update_post(&bob, post.id, BlogPostPatch::new(Some("X".into()), None, None))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
    assert!(err.to_string().contains("update"));

    let err = service.delete_post(&bob, post.id).unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
    assert!(err.to_string().contains("delete"));

    assert_eq!(service.get_post(&ada, post.id).unwrap(), post);
}

#[test]
fn empty_update_still_checks_ownership_without_writing() {
    let mut conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    let bob = add_user(&conn, "bob");
    let mut service = BlogPostService::new(SqliteBlogPostRepository::new(&mut conn));
    let post = service.create_post(&ada, request("A", "B", "C")).unwrap();
    let empty = || BlogPostPatch::new(Some(String::new()), None, Some(String::new()));

    assert_eq!(service.update_post(&ada, post.id, empty()).unwrap(), post);
    let err = service.update_post(&bob, post.id, empty()).unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
    assert!(err.to_string().contains("update"));
}

#[test]
fn missing_post_is_not_found_for_every_operation() {
    let mut conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    let mut service = BlogPostService::new(SqliteBlogPostRepository::new(&mut conn));

    assert!(matches!(
        service.get_post(&ada, 99),
        Err(ServiceError::NotFound { id: 99, .. })
    ));
    assert!(matches!(
        service.update_post(&ada, 99, BlogPostPatch::default()),
        Err(ServiceError::NotFound { id: 99, .. })
    ));
    assert!(matches!(
        service.delete_post(&ada, 99),
        Err(ServiceError::NotFound { id: 99, .. })
    ));
}

#[test]
fn owner_delete_is_permanent() {
    let mut conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    let mut service = BlogPostService::new(SqliteBlogPostRepository::new(&mut conn));
    let post = service.create_post(&ada, request("A", "B", "C")).unwrap();

    service.delete_post(&ada, post.id).unwrap();
    assert!(matches!(
        service.get_post(&ada, post.id),
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        service.delete_post(&ada, post.id),
        Err(ServiceError::NotFound { .. })
    ));
}

#[test]
fn repository_reports_not_owner_distinctly() {
    let mut conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    let bob = add_user(&conn, "bob");
    let mut repo = SqliteBlogPostRepository::new(&mut conn);
    let post = repo
        .create_post(
            ada.user_id,
            &quill_core::model::blog_post::NewBlogPost {
                title: "t".into(),
                sub_title: "s".into(),
                body: "b".into(),
            },
        )
        .unwrap();

    let err = repo.delete_owned_post(post.id, bob.user_id).unwrap_err();
    assert!(matches!(err, RepoError::NotOwner(id) if id == post.id));
    assert_eq!(repo.list_posts_by_owner(ada.user_id).unwrap().len(), 1);
    assert!(repo.list_posts_by_owner(bob.user_id).unwrap().is_empty());
}

#[test]
fn deleting_a_user_row_cascades_to_posts() {
    let mut conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    {
        let repo = SqliteBlogPostRepository::new(&mut conn);
        let service = BlogPostService::new(repo);
        service.create_post(&ada, request("A", "B", "C")).unwrap();
    }

    conn.execute("DELETE FROM users WHERE id = ?1;", [ada.user_id])
        .unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM blog_posts;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}
