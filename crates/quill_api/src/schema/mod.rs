//! GraphQL schema: object types, query and mutation roots.

pub mod account;
pub mod blog;
pub mod user;

use crate::guard::LoginRequired;
use crate::state::AppState;
use async_graphql::{EmptySubscription, MergedObject, Schema};

#[derive(MergedObject, Default)]
pub struct Query(blog::BlogQuery, user::UserQuery);

#[derive(MergedObject, Default)]
pub struct Mutation(blog::BlogMutation, account::AccountMutation);

pub type QuillSchema = Schema<Query, Mutation, EmptySubscription>;

/// Builds the schema once at startup. `state` is reachable from every
/// resolver through `ctx.data::<AppState>()`.
pub fn build_schema(state: AppState) -> QuillSchema {
    Schema::build(Query::default(), Mutation::default(), EmptySubscription)
        .data(state)
        .extension(LoginRequired)
        .finish()
}
