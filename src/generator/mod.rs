//! Stateful builder for terraform configuration.
//!
//! A [`Generator`] is a cheap value: it pairs an immutable scope (name
//! path, tags, provider aliases) with a shared handle to the one mutable
//! [`Generated`] aggregate of the session. The scope constructors
//! (`local_name_scope`, `local_tags`, `provider_alias`) return new
//! generator values that keep writing into the same aggregate.
//!
//! Single-threaded by design: all mutation is direct and in-process, and
//! the output directory is a single-writer resource.

mod emit;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use log::warn;

use crate::hcl::{expr_from_str, BodyItem, Expr};

/// Ordered name-path segments of a resource.
pub type ResourceName = Vec<String>;

/// Key-value tags inherited through nested scopes.
pub type TagsMap = BTreeMap<String, String>;

/// Handle to a declared resource. Carries the identity needed to reference
/// the resource (`type.joined_name`) and to target the metadata mutators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    pub tftype: String,
    pub tfname: ResourceName,
}

impl Resource {
    /// The `type.joined_name` token used in references and lookups.
    pub fn name_key(&self) -> String {
        format!("{}.{}", self.tftype, self.tfname.join("_"))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name_key())
    }
}

/// Handle to a declared data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataSource {
    pub tftype: String,
    pub tfname: ResourceName,
}

impl DataSource {
    /// Data sources are referenced under the `data.` prefix.
    pub fn name_key(&self) -> String {
        format!("data.{}.{}", self.tftype, self.tfname.join("_"))
    }
}

/// A [`Resource`] handle tagged with a zero-sized marker type, so that
/// resource libraries can hand out handles that only fit their own APIs.
pub struct TypedResource<T> {
    handle: Resource,
    _marker: PhantomData<T>,
}

impl<T> TypedResource<T> {
    pub fn handle(&self) -> &Resource {
        &self.handle
    }
}

impl<T> Clone for TypedResource<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::ops::Deref for TypedResource<T> {
    type Target = Resource;

    fn deref(&self) -> &Resource {
        &self.handle
    }
}

/// A [`DataSource`] handle tagged with a marker type.
pub struct TypedDataSource<T> {
    handle: DataSource,
    _marker: PhantomData<T>,
}

impl<T> TypedDataSource<T> {
    pub fn handle(&self) -> &DataSource {
        &self.handle
    }
}

impl<T> Clone for TypedDataSource<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::ops::Deref for TypedDataSource<T> {
    type Target = DataSource;

    fn deref(&self) -> &DataSource {
        &self.handle
    }
}

/// Handle to a declared provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub tftype: String,
}

#[derive(Debug, Clone)]
pub(crate) enum Provisioner {
    LocalExec { script: String },
}

#[derive(Debug, Clone)]
pub(crate) struct ProviderDetails {
    pub tftype: String,
    pub fields: Vec<BodyItem>,
}

#[derive(Debug, Clone)]
pub(crate) struct ResourceDetails {
    pub tftype: String,
    pub tfname: ResourceName,
    pub fields: Vec<BodyItem>,
    pub ignore_changes: Vec<String>,
    pub depends_on: Vec<Resource>,
    pub provisioners: Vec<Provisioner>,
    pub provider_alias: Option<String>,
    pub create_before_destroy: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct DataSourceDetails {
    pub tftype: String,
    pub tfname: ResourceName,
    pub fields: Vec<BodyItem>,
    pub provider_alias: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct OutputDetails {
    pub tfname: ResourceName,
    pub value: Expr,
}

/// The shared aggregate all scoped generators write into.
///
/// Invariant: every push into `resources` / `datasources` also updates the
/// corresponding by-name index.
#[derive(Debug, Default)]
pub(crate) struct Generated {
    pub providers: Vec<ProviderDetails>,
    pub resources: Vec<ResourceDetails>,
    pub resources_by_name: HashMap<String, usize>,
    pub datasources: Vec<DataSourceDetails>,
    pub datasources_by_name: HashMap<String, usize>,
    pub outputs: Vec<OutputDetails>,
    pub adhoc_files: BTreeMap<String, String>,
    pub backend_file: Option<(String, String)>,
}

impl Generated {
    fn add_resource(&mut self, details: ResourceDetails) {
        let key = Resource {
            tftype: details.tftype.clone(),
            tfname: details.tfname.clone(),
        }
        .name_key();
        self.resources.push(details);
        self.resources_by_name.insert(key, self.resources.len() - 1);
    }

    fn add_data_source(&mut self, details: DataSourceDetails) {
        let key = DataSource {
            tftype: details.tftype.clone(),
            tfname: details.tfname.clone(),
        }
        .name_key();
        self.datasources.push(details);
        self.datasources_by_name
            .insert(key, self.datasources.len() - 1);
    }
}

/// The per-generator scope: a value copied on every nesting step while the
/// aggregate stays shared. Tag and alias maps merge by shallow override,
/// innermost wins.
#[derive(Debug, Clone, Default)]
struct Scope {
    name: ResourceName,
    tags: TagsMap,
    provider_aliases: BTreeMap<String, String>,
}

/// The implicit provider type of a resource type: everything before the
/// first underscore, or the whole type if there is none.
pub fn provider_type_of(tftype: &str) -> &str {
    tftype.split('_').next().unwrap_or(tftype)
}

#[derive(Clone)]
pub struct Generator {
    scope: Scope,
    generated: Rc<RefCell<Generated>>,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator {
    /// Start a new top-level session with an empty scope and aggregate.
    pub fn new() -> Self {
        Self {
            scope: Scope::default(),
            generated: Rc::new(RefCell::new(Generated::default())),
        }
    }

    /// Declare a terraform provider.
    pub fn create_provider(&self, tftype: &str, fields: Vec<BodyItem>) -> Provider {
        self.generated.borrow_mut().providers.push(ProviderDetails {
            tftype: tftype.to_owned(),
            fields,
        });
        Provider {
            tftype: tftype.to_owned(),
        }
    }

    /// Declare a resource named under the current scope.
    pub fn create_resource(&self, tftype: &str, name: &str, fields: Vec<BodyItem>) -> Resource {
        let tfname = self.scoped_name(name);
        let details = ResourceDetails {
            tftype: tftype.to_owned(),
            tfname: tfname.clone(),
            fields,
            ignore_changes: Vec::new(),
            depends_on: Vec::new(),
            provisioners: Vec::new(),
            provider_alias: self.resolved_provider_alias(tftype),
            create_before_destroy: false,
        };
        self.generated.borrow_mut().add_resource(details);
        Resource {
            tftype: tftype.to_owned(),
            tfname,
        }
    }

    /// Declare a resource and return a handle tagged with a marker type.
    pub fn create_typed_resource<T>(
        &self,
        tftype: &str,
        name: &str,
        fields: Vec<BodyItem>,
    ) -> TypedResource<T> {
        TypedResource {
            handle: self.create_resource(tftype, name, fields),
            _marker: PhantomData,
        }
    }

    /// Declare a data source named under the current scope.
    pub fn create_data_source(&self, tftype: &str, name: &str, fields: Vec<BodyItem>) -> DataSource {
        let tfname = self.scoped_name(name);
        let details = DataSourceDetails {
            tftype: tftype.to_owned(),
            tfname: tfname.clone(),
            fields,
            provider_alias: self.resolved_provider_alias(tftype),
        };
        self.generated.borrow_mut().add_data_source(details);
        DataSource {
            tftype: tftype.to_owned(),
            tfname,
        }
    }

    /// Declare a data source and return a handle tagged with a marker type.
    pub fn create_typed_data_source<T>(
        &self,
        tftype: &str,
        name: &str,
        fields: Vec<BodyItem>,
    ) -> TypedDataSource<T> {
        TypedDataSource {
            handle: self.create_data_source(tftype, name, fields),
            _marker: PhantomData,
        }
    }

    /// Declare an output named under the current scope. The value string is
    /// converted at the expression boundary, so `"${...}"` references and
    /// multi-line strings come out as the right expression kind.
    pub fn create_output(&self, name: &str, value: &str) {
        let tfname = self.scoped_name(name);
        self.generated.borrow_mut().outputs.push(OutputDetails {
            tfname,
            value: expr_from_str(value),
        });
    }

    /// Register a raw text file to be written alongside the generated
    /// terraform, bypassing the structured model.
    pub fn create_adhoc_file(&self, path: &str, content: &str) {
        self.generated
            .borrow_mut()
            .adhoc_files
            .insert(path.to_owned(), content.to_owned());
    }

    /// Register the single backend configuration file. A later call
    /// replaces an earlier one.
    pub fn create_backend_file(&self, path: &str, content: &str) {
        self.generated.borrow_mut().backend_file =
            Some((path.to_owned(), content.to_owned()));
    }

    /// Mark a field whose remote-side changes must not trigger an update.
    pub fn ignore_changes(&self, resource: &Resource, fieldname: &str) {
        self.with_resource_details(resource, |details| {
            details.ignore_changes.push(fieldname.to_owned());
        });
    }

    /// Mark the resource so a replacement is created before the original is
    /// destroyed.
    pub fn create_before_destroy(&self, resource: &Resource, value: bool) {
        self.with_resource_details(resource, |details| {
            details.create_before_destroy = value;
        });
    }

    /// Record that `resource` depends on the existence of `on`. The edge is
    /// only emitted as a `depends_on` attribute; it never reorders output.
    /// Duplicate edges and cycles are not checked.
    pub fn depends_on(&self, resource: &Resource, on: &Resource) {
        if !self
            .generated
            .borrow()
            .resources_by_name
            .contains_key(&on.name_key())
        {
            warn!("unknown resource {}, dependency ignored", on.name_key());
            return;
        }
        self.with_resource_details(resource, |details| {
            details.depends_on.push(on.clone());
        });
    }

    /// Attach a `local-exec` provisioner running the given shell script.
    pub fn local_exec_provisioner(&self, resource: &Resource, script: &str) {
        self.with_resource_details(resource, |details| {
            details.provisioners.push(Provisioner::LocalExec {
                script: script.to_owned(),
            });
        });
    }

    fn with_resource_details<F: FnOnce(&mut ResourceDetails)>(&self, resource: &Resource, f: F) {
        let mut generated = self.generated.borrow_mut();
        match generated.resources_by_name.get(&resource.name_key()).copied() {
            Some(index) => f(&mut generated.resources[index]),
            // Stale handles (e.g. from another session) are ignored so a
            // partial regeneration never aborts, but they are worth a trace.
            None => warn!("unknown resource {}, metadata ignored", resource.name_key()),
        }
    }

    fn resolved_provider_alias(&self, tftype: &str) -> Option<String> {
        let ptype = provider_type_of(tftype);
        self.scope
            .provider_aliases
            .get(ptype)
            .map(|alias| format!("{}.{}", ptype, alias))
    }

    /// The name the given local name would get in the current scope.
    pub fn scoped_name(&self, name: &str) -> ResourceName {
        let mut tfname = self.scope.name.clone();
        tfname.push(name.to_owned());
        tfname
    }

    /// The current name scope.
    pub fn name_context(&self) -> ResourceName {
        self.scope.name.clone()
    }

    /// The tags of the current scope.
    pub fn tags_context(&self) -> TagsMap {
        self.scope.tags.clone()
    }

    /// A generator with `name` pushed onto the name scope.
    pub fn local_name_scope(&self, name: &str) -> Generator {
        let mut scope = self.scope.clone();
        scope.name.push(name.to_owned());
        Generator {
            scope,
            generated: Rc::clone(&self.generated),
        }
    }

    /// A generator whose resources of the given provider type record the
    /// aliased provider.
    pub fn provider_alias(&self, provider_type: &str, alias: &str) -> Generator {
        let mut scope = self.scope.clone();
        scope
            .provider_aliases
            .insert(provider_type.to_owned(), alias.to_owned());
        Generator {
            scope,
            generated: Rc::clone(&self.generated),
        }
    }

    /// A generator with the given tags merged over the current ones.
    pub fn local_tags(&self, tags: TagsMap) -> Generator {
        let mut scope = self.scope.clone();
        scope.tags.extend(tags);
        Generator {
            scope,
            generated: Rc::clone(&self.generated),
        }
    }
}

/// Run `f` against a generator with `name` pushed onto the name scope.
pub fn with_local_name_scope<T, F: FnOnce(&Generator) -> T>(
    generator: &Generator,
    name: &str,
    f: F,
) -> T {
    f(&generator.local_name_scope(name))
}
