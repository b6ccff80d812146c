//! Schema introspection and migrations over a direct Postgres connection.

use diesel::{
    QueryableByName, sql_query,
    sql_types::{BigInt, Text},
};
use diesel_async::{
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
    async_connection_wrapper::AsyncConnectionWrapper,
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use finbase_core::schema_diagram::{ColumnInfo, ForeignKey, KeyColumn};

use super::{Error, Result};

pub const DEFAULT_SCHEMA: &str = "public";

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../db/migrations");

#[derive(QueryableByName)]
struct ColumnRow {
    #[diesel(sql_type = Text)]
    table_name: String,
    #[diesel(sql_type = Text)]
    column_name: String,
    #[diesel(sql_type = Text)]
    data_type: String,
}

#[derive(QueryableByName)]
struct KeyColumnRow {
    #[diesel(sql_type = Text)]
    table_name: String,
    #[diesel(sql_type = Text)]
    column_name: String,
}

#[derive(QueryableByName)]
struct ForeignKeyRow {
    #[diesel(sql_type = Text)]
    child_table: String,
    #[diesel(sql_type = Text)]
    child_column: String,
    #[diesel(sql_type = Text)]
    parent_table: String,
    #[diesel(sql_type = Text)]
    parent_column: String,
}

#[derive(QueryableByName)]
struct Count {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

/// # Errors
pub async fn connect(database_url: &str) -> Result<AsyncPgConnection> {
    Ok(AsyncPgConnection::establish(database_url).await?)
}

/// # Errors
pub async fn columns(schema: &str, db_conn: &mut AsyncPgConnection) -> Result<Vec<ColumnInfo>> {
    let rows: Vec<ColumnRow> = sql_query(
        "select table_name::text, column_name::text, data_type::text
         from information_schema.columns
         where table_schema = $1
         order by table_name, ordinal_position",
    )
    .bind::<Text, _>(schema)
    .load(db_conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |ColumnRow {
                 table_name,
                 column_name,
                 data_type,
             }| ColumnInfo {
                table_name,
                column_name,
                data_type,
            },
        )
        .collect())
}

/// # Errors
pub async fn primary_keys(
    schema: &str,
    db_conn: &mut AsyncPgConnection,
) -> Result<Vec<KeyColumn>> {
    let rows: Vec<KeyColumnRow> = sql_query(
        "select kcu.table_name::text, kcu.column_name::text
         from information_schema.table_constraints tc
         join information_schema.key_column_usage kcu
           on tc.constraint_name = kcu.constraint_name
          and tc.table_schema = kcu.table_schema
         where tc.constraint_type = 'PRIMARY KEY'
           and tc.table_schema = $1
         order by kcu.table_name, kcu.ordinal_position",
    )
    .bind::<Text, _>(schema)
    .load(db_conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |KeyColumnRow {
                 table_name,
                 column_name,
             }| KeyColumn {
                table_name,
                column_name,
            },
        )
        .collect())
}

/// # Errors
pub async fn foreign_keys(
    schema: &str,
    db_conn: &mut AsyncPgConnection,
) -> Result<Vec<ForeignKey>> {
    let rows: Vec<ForeignKeyRow> = sql_query(
        "select kcu.table_name::text as child_table,
                kcu.column_name::text as child_column,
                ccu.table_name::text as parent_table,
                ccu.column_name::text as parent_column
         from information_schema.table_constraints tc
         join information_schema.key_column_usage kcu
           on tc.constraint_name = kcu.constraint_name
          and tc.table_schema = kcu.table_schema
         join information_schema.constraint_column_usage ccu
           on ccu.constraint_name = tc.constraint_name
          and ccu.table_schema = tc.table_schema
         where tc.constraint_type = 'FOREIGN KEY'
           and tc.table_schema = $1
         order by child_table, child_column",
    )
    .bind::<Text, _>(schema)
    .load(db_conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |ForeignKeyRow {
                 child_table,
                 child_column,
                 parent_table,
                 parent_column,
             }| ForeignKey {
                child_table,
                child_column,
                parent_table,
                parent_column,
            },
        )
        .collect())
}

/// Number of accounts in the auth schema.
///
/// # Errors
pub async fn count_users(db_conn: &mut AsyncPgConnection) -> Result<i64> {
    let Count { count } = sql_query("select count(*) as count from auth.users")
        .get_result(db_conn)
        .await?;

    Ok(count)
}

/// Applies pending migrations, returning the versions that ran.
///
/// # Errors
pub async fn run_migrations(db_conn: AsyncPgConnection) -> Result<Vec<String>> {
    let mut wrapper: AsyncConnectionWrapper<AsyncPgConnection> =
        AsyncConnectionWrapper::from(db_conn);

    tokio::task::spawn_blocking(move || {
        wrapper
            .run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.iter().map(ToString::to_string).collect())
            .map_err(|e| Error::Database {
                message: e.to_string(),
            })
    })
    .await
    .map_err(|e| Error::Other {
        message: e.to_string(),
    })?
}

#[cfg(test)]
mod tests {
    use diesel_async::SimpleAsyncConnection;
    use finbase_core::schema_diagram::render_mermaid;
    use pretty_assertions::assert_eq;
    use testcontainers_modules::{
        postgres::Postgres,
        testcontainers::{ContainerAsync, runners::AsyncRunner},
    };

    use super::*;

    async fn database_url(container: &ContainerAsync<Postgres>) -> String {
        format!(
            "postgres://postgres:postgres@{}:{}/postgres",
            container.get_host().await.unwrap(),
            container.get_host_port_ipv4(5432).await.unwrap()
        )
    }

    #[tokio::test]
    #[ignore = "starts a Postgres container"]
    async fn introspects_a_real_schema() {
        let container = Postgres::default().start().await.unwrap();
        let url = database_url(&container).await;
        let db_conn = &mut connect(&url).await.unwrap();

        db_conn
            .batch_execute(
                "create table fish (id bigint primary key, name text, mother_fish_id bigint references fish (id));
                 create table transgenes (id bigint primary key, name text);
                 create table fish_transgenes (
                     fish_id bigint references fish (id),
                     transgene_id bigint references transgenes (id),
                     notes text
                 );
                 create schema auth;
                 create table auth.users (id uuid primary key);",
            )
            .await
            .unwrap();

        let columns = columns(DEFAULT_SCHEMA, db_conn).await.unwrap();
        let keys = primary_keys(DEFAULT_SCHEMA, db_conn).await.unwrap();
        let fks = foreign_keys(DEFAULT_SCHEMA, db_conn).await.unwrap();

        assert_eq!(columns.len(), 8);
        assert_eq!(keys.len(), 2);
        assert_eq!(fks.len(), 3);
        assert!(
            render_mermaid(&columns, &keys, &fks).contains("fish ||--o{ fish_transgenes : fish_id")
        );
        assert_eq!(count_users(db_conn).await.unwrap(), 0);
    }

    async fn count(query: &str, db_conn: &mut AsyncPgConnection) -> i64 {
        let Count { count } = sql_query(query).get_result(db_conn).await.unwrap();
        count
    }

    #[tokio::test]
    #[ignore = "starts a Postgres container"]
    async fn fish_functions_are_all_or_nothing() {
        let container = Postgres::default().start().await.unwrap();
        let url = database_url(&container).await;

        let mut db_conn = connect(&url).await.unwrap();
        db_conn
            .batch_execute(
                "create role authenticated;
                 create table fish (
                     id bigint generated always as identity primary key,
                     name text,
                     date_birth date,
                     notes text,
                     line_building_stage text,
                     fish_code text,
                     mother_fish_id bigint references fish (id),
                     father_fish_id bigint references fish (id),
                     created_at timestamptz default now(),
                     created_by uuid
                 );
                 create table transgenes (id bigint primary key, name text);
                 create table mutations (id bigint primary key, name text);
                 create table treatments (id bigint primary key, name text);
                 create table strains (id bigint primary key, name text);
                 create table fish_transgenes (
                     fish_id bigint references fish (id),
                     transgene_id bigint references transgenes (id)
                 );
                 create table fish_mutations (
                     fish_id bigint references fish (id),
                     mutation_id bigint references mutations (id)
                 );
                 create table fish_treatments (
                     fish_id bigint references fish (id),
                     treatment_id bigint references treatments (id)
                 );
                 create table fish_strains (
                     fish_id bigint references fish (id),
                     strain_id bigint references strains (id)
                 );
                 insert into transgenes values (1, 'Tg(mpx:GFP)');
                 insert into strains values (1, 'AB');",
            )
            .await
            .unwrap();

        let applied = run_migrations(db_conn).await.unwrap();
        assert_eq!(applied.len(), 2);

        let db_conn = &mut connect(&url).await.unwrap();

        let mother = count(
            r#"select id as count from create_fish_with_links(
                   '{"name": " mom ", "line_building_stage": ""}'::jsonb,
                   array[1]::bigint[], '{}', '{}', array[1]::bigint[]
               )"#,
            db_conn,
        )
        .await;
        assert_eq!(
            count("select count(*) as count from fish_transgenes", db_conn).await,
            1
        );
        assert_eq!(
            count("select count(*) as count from fish_strains", db_conn).await,
            1
        );

        let missing_transgene: std::result::Result<Count, _> = sql_query(
            r#"select id as count from create_fish_with_links(
                   '{"name": "pup"}'::jsonb, array[99]::bigint[]
               )"#,
        )
        .get_result(db_conn)
        .await;
        assert!(missing_transgene.is_err());
        assert_eq!(count("select count(*) as count from fish", db_conn).await, 1);

        db_conn
            .batch_execute(&format!(
                "insert into fish (name, mother_fish_id) values ('pup', {mother})"
            ))
            .await
            .unwrap();
        let still_a_parent: std::result::Result<Count, _> = sql_query(format!(
            "select id as count from delete_fish_with_links({mother})"
        ))
        .get_result(db_conn)
        .await;
        assert!(still_a_parent.is_err());
        assert_eq!(
            count("select count(*) as count from fish_strains", db_conn).await,
            1
        );

        db_conn
            .batch_execute("delete from fish where name = 'pup'")
            .await
            .unwrap();
        let deleted = count(
            &format!("select id as count from delete_fish_with_links({mother})"),
            db_conn,
        )
        .await;
        assert_eq!(deleted, mother);
        assert_eq!(count("select count(*) as count from fish", db_conn).await, 0);
        assert_eq!(
            count("select count(*) as count from fish_transgenes", db_conn).await,
            0
        );
    }
}
