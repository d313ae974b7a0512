/// # Test Utilities Module
///
/// Shared fixtures for tablekit's unit and integration tests: a small
/// Chinook-style music catalog in an isolated in-memory database.

use crate::core::{Result, TablekitError};
use crate::database::Database;

/// Chinook subset used across tests. Types follow the published Chinook
/// sample database (NVARCHAR, NUMERIC(10,2), DATETIME).
pub const CHINOOK_SCHEMA: &str = "
    CREATE TABLE Artist (
        ArtistId INTEGER NOT NULL PRIMARY KEY,
        Name NVARCHAR(120)
    );
    CREATE TABLE Album (
        AlbumId INTEGER NOT NULL PRIMARY KEY,
        Title NVARCHAR(160) NOT NULL,
        ArtistId INTEGER NOT NULL REFERENCES Artist (ArtistId)
    );
    CREATE TABLE Track (
        TrackId INTEGER NOT NULL PRIMARY KEY,
        Name NVARCHAR(200) NOT NULL,
        AlbumId INTEGER REFERENCES Album (AlbumId),
        Composer NVARCHAR(220),
        Milliseconds INTEGER NOT NULL,
        Bytes INTEGER,
        UnitPrice NUMERIC(10,2) NOT NULL
    );
    CREATE TABLE Invoice (
        InvoiceId INTEGER NOT NULL PRIMARY KEY,
        InvoiceDate DATETIME NOT NULL,
        BillingCity NVARCHAR(40),
        Total NUMERIC(10,2) NOT NULL
    );
    CREATE TABLE PlaylistTrack (
        PlaylistId INTEGER NOT NULL,
        TrackId INTEGER NOT NULL REFERENCES Track (TrackId),
        CONSTRAINT PK_PlaylistTrack PRIMARY KEY (PlaylistId, TrackId)
    );
";

const CHINOOK_DATA: &str = "
    INSERT INTO Artist (ArtistId, Name) VALUES (1, 'AC/DC'), (2, 'Accept');
    INSERT INTO Album (AlbumId, Title, ArtistId) VALUES
        (1, 'For Those About To Rock We Salute You', 1),
        (2, 'Balls to the Wall', 2);
    INSERT INTO Track (TrackId, Name, AlbumId, Composer, Milliseconds, Bytes, UnitPrice) VALUES
        (1, 'For Those About To Rock (We Salute You)', 1, 'Angus Young, Malcolm Young, Brian Johnson', 343719, 11170334, 0.99),
        (2, 'Balls to the Wall', 2, NULL, 342562, 5510424, 0.99);
    INSERT INTO Invoice (InvoiceId, InvoiceDate, BillingCity, Total) VALUES
        (1, '2009-01-01 00:00:00', 'Stuttgart', 1.98);
    INSERT INTO PlaylistTrack (PlaylistId, TrackId) VALUES (1, 1), (1, 2);
";

/// Isolated database test fixture
pub struct ChinookFixture {
    pub db: Database,
}

impl ChinookFixture {
    /// Schema only, no rows
    pub fn empty() -> Result<Self> {
        let db = Database::open_in_memory()?;
        db.connection().execute_batch(CHINOOK_SCHEMA)?;
        Ok(ChinookFixture { db })
    }

    /// Schema plus a handful of sample rows
    pub fn with_sample_data() -> Result<Self> {
        let fixture = Self::empty()?;
        fixture.db.connection().execute_batch(CHINOOK_DATA)?;
        Ok(fixture)
    }
}

/// Error-assertion helpers
pub mod error_testing {
    use super::*;

    /// Asserts a backend error names the operation and table it came from
    pub fn assert_backend_context<T: std::fmt::Debug>(result: Result<T>, operation: &str, table: &str) {
        match result {
            Err(TablekitError::Backend {
                operation: op,
                table: t,
                ..
            }) => {
                assert_eq!(op, operation);
                assert_eq!(t, table);
            }
            other => panic!("Expected Backend error from {} on {}, got {:?}", operation, table, other),
        }
    }
}
