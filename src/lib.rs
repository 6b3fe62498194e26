//! `tfgen` is an embedded DSL for generating Terraform configuration.
//!
//! Infrastructure code drives a [`Generator`] to declare providers,
//! resources, data sources and outputs. The declarations accumulate in a
//! shared aggregate, get partitioned into `.tf` files by name scope, are
//! rendered through the HCL2 AST in [`hcl`], and are synced to an output
//! directory by manifest-tracked writes that also delete stale files from
//! previous runs.
//!
//! ```no_run
//! use tfgen::{Generator, hcl::attribute};
//!
//! let tfgen = Generator::new();
//! tfgen.create_provider("aws", vec![attribute("region", "ap-southeast-2")]);
//!
//! let net = tfgen.local_name_scope("net");
//! let vpc = net.create_resource(
//!     "aws_vpc",
//!     "main",
//!     vec![attribute("cidr_block", "10.0.0.0/16")],
//! );
//! net.create_output("vpc_id", "${aws_vpc.net_main.id}");
//! tfgen.ignore_changes(&vpc, "tags");
//!
//! tfgen.write_files(std::path::Path::new("terraform"))?;
//! # anyhow::Ok(())
//! ```

pub mod generator;
pub mod hcl;
pub mod manifest;

pub use generator::{
    provider_type_of, with_local_name_scope, DataSource, Generator, Provider, Resource,
    ResourceName, TagsMap, TypedDataSource, TypedResource,
};
pub use hcl::{expr_from_str, raw_expr, BodyItem, ConfigFile, Expr, Identifier};
pub use manifest::{Manifest, ManifestEntry};
