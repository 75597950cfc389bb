//! SQLite schema for the scrobble database.
//!
//! Activity rows are denormalized: artist and album names are copied onto
//! each row next to the foreign keys, so reporting queries rarely need joins.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, SqlType, Table, VersionedSchema};

const ARTIST_TABLE_V1: Table = Table {
    name: "artist",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("mbid", &SqlType::Text),
    ],
    indices: &[("idx_artist_name", "name")],
};

const ALBUM_TABLE_V1: Table = Table {
    name: "album",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("mbid", &SqlType::Text),
    ],
    indices: &[("idx_album_name", "name")],
};

const IMAGE_TABLE_V1: Table = Table {
    name: "image",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("url", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_image_url", "url")],
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artist",
    foreign_column: "id",
};

const ALBUM_FK: ForeignKey = ForeignKey {
    foreign_table: "album",
    foreign_column: "id",
};

const IMAGE_FK: ForeignKey = ForeignKey {
    foreign_table: "image",
    foreign_column: "id",
};

const ACTIVITY_TABLE_V1: Table = Table {
    name: "activity",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("uts", &SqlType::Integer, non_null = true),
        sqlite_column!("dt", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("mbid", &SqlType::Text),
        sqlite_column!("url", &SqlType::Text),
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("album", &SqlType::Text, non_null = true),
        sqlite_column!(
            "album_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ALBUM_FK)
        ),
        sqlite_column!("image_id", &SqlType::Integer, foreign_key = Some(&IMAGE_FK)),
        sqlite_column!(
            "duplicate",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_activity_uts", "uts DESC")],
};

pub const SCROBBLE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        ARTIST_TABLE_V1,
        ALBUM_TABLE_V1,
        IMAGE_TABLE_V1,
        ACTIVITY_TABLE_V1,
    ],
}];
