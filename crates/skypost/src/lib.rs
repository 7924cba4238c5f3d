//! # skypost
//!
//! Build Bluesky post records from plain text and images.
//!
//! A build takes a [`PostDraft`] and produces an `app.bsky.feed.post`
//! [`PostRecord`]:
//!
//! 1. [`richtext`] finds links, `@handle` mentions and `#tags`, as byte
//!    ranges into the UTF-8 text.
//! 2. [`resolve`] turns mention handles into DIDs. A handle that does not
//!    resolve loses its facet and is reported to a [`FaultSink`].
//! 3. [`image`] shrinks each attached image until it fits the blob size
//!    ceiling, and [`blob`] uploads it. Any image failure fails the build.
//! 4. [`record`] assembles the facets (links, then mentions, then tags) and
//!    image embeds into the record.
//!
//! Steps 2 and 3 run concurrently. [`Composer`] drives the whole thing;
//! [`publish::create_post`] writes the result to a repository.
//!
//! ```no_run
//! # async fn example() -> miette::Result<()> {
//! use skypost::{Composer, PostDraft};
//! use skypost::blob::XrpcBlobStore;
//! use skypost::publish::create_post;
//! use skypost_common::XrpcEndpoint;
//! use skypost_identity::PublicResolver;
//!
//! let pds = XrpcEndpoint::parse("https://bsky.social")
//!     .map_err(|e| miette::miette!("{e}"))?
//!     .with_access_jwt("<access jwt>");
//! let http = reqwest::Client::new();
//! let composer = Composer::new(
//!     PublicResolver::default(),
//!     XrpcBlobStore::new(http.clone(), pds.clone()),
//! );
//!
//! let record = composer
//!     .compose(&PostDraft::new("Hello @itodd.dev! https://go.dev #golang").lang("en"))
//!     .await?;
//! let created = create_post(&http, &pds, "did:plc:ewvi7nxzyoun6zhxrhs64oiz", &record).await?;
//! println!("{}", created.uri);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub use skypost_common as common;
pub use skypost_identity as identity;

pub mod blob;
pub mod compose;
pub mod error;
pub mod facet;
pub mod image;
pub mod observe;
pub mod publish;
pub mod record;
pub mod resolve;
pub mod richtext;

pub use blob::{BlobStore, UploadError, XrpcBlobStore};
pub use compose::{ComposeOptions, Composer, LocalImage, PostDraft};
pub use error::{BuildError, Stage};
pub use facet::{ByteSlice, Facet, Feature};
pub use observe::{Fault, FaultSink, TracingSink};
pub use record::{PostRecord, assemble};
