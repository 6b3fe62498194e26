//! Turns the accumulated aggregate into `.tf` files on disk.
//!
//! Declarations are partitioned into files by the first segment of their
//! name path, rendered in a fixed order (providers, data sources,
//! resources, outputs) and synced to the output directory through one
//! manifest per category, so files from removed declarations get deleted.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use log::info;

use crate::hcl::serializer::generate;
use crate::hcl::{
    attribute, block, unique_heredoc_delimiter, variable, BodyItem, ConfigFile, Expr, Identifier,
};
use crate::manifest::Manifest;

use super::{
    DataSourceDetails, Generated, Generator, OutputDetails, Provisioner, ProviderDetails,
    ResourceDetails,
};

const ROOT_FILE: &str = "root.tf";

/// The file a scoped declaration belongs to: its first name segment when
/// the path has more than one, else the root file.
pub(crate) fn resource_file(tfname: &[String]) -> String {
    if tfname.len() > 1 {
        format!("{}.tf", tfname[0])
    } else {
        ROOT_FILE.to_owned()
    }
}

pub(crate) fn provider_file(tftype: &str) -> String {
    format!("{}.tf", tftype)
}

#[derive(Default)]
struct FilePlan<'a> {
    datasources: Vec<&'a DataSourceDetails>,
    resources: Vec<&'a ResourceDetails>,
    outputs: Vec<&'a OutputDetails>,
}

fn group_resources(generated: &Generated) -> BTreeMap<String, FilePlan<'_>> {
    let mut files: BTreeMap<String, FilePlan> = BTreeMap::new();
    for datasource in &generated.datasources {
        files
            .entry(resource_file(&datasource.tfname))
            .or_default()
            .datasources
            .push(datasource);
    }
    for resource in &generated.resources {
        files
            .entry(resource_file(&resource.tfname))
            .or_default()
            .resources
            .push(resource);
    }
    for output in &generated.outputs {
        files
            .entry(resource_file(&output.tfname))
            .or_default()
            .outputs
            .push(output);
    }
    files
}

fn group_providers(generated: &Generated) -> BTreeMap<String, Vec<&ProviderDetails>> {
    let mut files: BTreeMap<String, Vec<&ProviderDetails>> = BTreeMap::new();
    for provider in &generated.providers {
        files
            .entry(provider_file(&provider.tftype))
            .or_default()
            .push(provider);
    }
    files
}

fn file_header() -> Vec<BodyItem> {
    vec![
        BodyItem::InlineComment("Generated by tfgen. Manual edits will be overwritten.".into()),
        BodyItem::BlankLine,
    ]
}

fn provider_config(provider: &ProviderDetails) -> BodyItem {
    block(
        "provider",
        vec![provider.tftype.as_str().into()],
        provider.fields.clone(),
    )
}

fn data_source_config(datasource: &DataSourceDetails) -> BodyItem {
    let mut body = datasource.fields.clone();
    if let Some(alias) = &datasource.provider_alias {
        body.push(attribute("provider", variable(alias.as_str())));
    }
    block(
        "data",
        vec![
            datasource.tftype.as_str().into(),
            datasource.tfname.join("_").into(),
        ],
        body,
    )
}

fn resource_config(resource: &ResourceDetails) -> BodyItem {
    let mut body = resource.fields.clone();

    if let Some(alias) = &resource.provider_alias {
        body.push(attribute("provider", variable(alias.as_str())));
    }
    if !resource.depends_on.is_empty() {
        body.push(attribute(
            "depends_on",
            Expr::Tuple(
                resource
                    .depends_on
                    .iter()
                    .map(|dep| variable(dep.name_key()))
                    .collect(),
            ),
        ));
    }
    if !resource.ignore_changes.is_empty() || resource.create_before_destroy {
        let mut lifecycle = Vec::new();
        if !resource.ignore_changes.is_empty() {
            lifecycle.push(attribute(
                "ignore_changes",
                Expr::Tuple(
                    resource
                        .ignore_changes
                        .iter()
                        .map(|field| variable(field.as_str()))
                        .collect(),
                ),
            ));
        }
        if resource.create_before_destroy {
            lifecycle.push(attribute("create_before_destroy", true));
        }
        body.push(block("lifecycle", vec![], lifecycle));
    }
    for provisioner in &resource.provisioners {
        match provisioner {
            Provisioner::LocalExec { script } => {
                body.push(block(
                    "provisioner",
                    vec!["local-exec".into()],
                    vec![attribute(
                        "command",
                        Expr::Heredoc {
                            delimiter: Identifier::new(unique_heredoc_delimiter(script)),
                            body: script.clone(),
                            indented: false,
                        },
                    )],
                ));
            }
        }
    }

    block(
        "resource",
        vec![
            resource.tftype.as_str().into(),
            resource.tfname.join("_").into(),
        ],
        body,
    )
}

fn output_config(output: &OutputDetails) -> BodyItem {
    block(
        "output",
        vec![output.tfname.join("_").into()],
        vec![BodyItem::Attribute(
            Identifier::new("value"),
            output.value.clone(),
        )],
    )
}

fn file_config(plan: &FilePlan<'_>) -> ConfigFile {
    let mut config = file_header();
    for datasource in &plan.datasources {
        config.push(data_source_config(datasource));
        config.push(BodyItem::BlankLine);
    }
    for resource in &plan.resources {
        config.push(resource_config(resource));
        config.push(BodyItem::BlankLine);
    }
    for output in &plan.outputs {
        config.push(output_config(output));
        config.push(BodyItem::BlankLine);
    }
    config
}

impl Generator {
    /// Render the whole session and sync it to `outdir`.
    ///
    /// Each category (providers, resources, adhoc, backend) clears the
    /// files recorded by its manifest from the previous run, writes the
    /// current set and persists the ledger. Categories are independent: a
    /// failure partway through leaves earlier categories written and later
    /// ones untouched.
    pub fn write_files(&self, outdir: &Path) -> Result<()> {
        let generated = self.generated.borrow();

        let mut providers = Manifest::open("providers", outdir);
        providers.clear_files()?;
        for (file, details) in group_providers(&generated) {
            let mut config = file_header();
            for provider in details {
                config.push(provider_config(provider));
                config.push(BodyItem::BlankLine);
            }
            providers.write_file(&file, &generate(&config))?;
        }
        providers.save()?;

        let mut resources = Manifest::open("resources", outdir);
        resources.clear_files()?;
        for (file, plan) in group_resources(&generated) {
            resources.write_file(&file, &generate(&file_config(&plan)))?;
        }
        resources.save()?;

        let mut adhoc = Manifest::open("adhoc", outdir);
        adhoc.clear_files()?;
        for (file, content) in &generated.adhoc_files {
            adhoc.write_file(file, content)?;
        }
        adhoc.save()?;

        let mut backend = Manifest::open("backend", outdir);
        backend.clear_files()?;
        if let Some((file, content)) = &generated.backend_file {
            backend.write_file(file, content)?;
        }
        backend.save()?;

        info!(
            "generated {} provider(s), {} resource(s), {} data source(s), {} output(s) into {}",
            generated.providers.len(),
            generated.resources.len(),
            generated.datasources.len(),
            generated.outputs.len(),
            outdir.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_key_rule() {
        assert_eq!(
            resource_file(&["net".into(), "vpc".into()]),
            "net.tf"
        );
        assert_eq!(resource_file(&["web".into()]), "root.tf");
        assert_eq!(resource_file(&[]), "root.tf");
        assert_eq!(provider_file("aws"), "aws.tf");
    }

    #[test]
    fn resources_partition_by_first_segment() {
        let g = Generator::new();
        g.local_name_scope("net")
            .local_name_scope("vpc")
            .create_resource("aws_vpc", "main", vec![]);
        g.local_name_scope("app")
            .local_name_scope("server")
            .create_resource("aws_instance", "web", vec![]);
        g.create_resource("aws_eip", "ip", vec![]);

        let generated = g.generated.borrow();
        let files = group_resources(&generated);
        let names: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["app.tf", "net.tf", "root.tf"]);
        assert_eq!(files["net.tf"].resources.len(), 1);
        assert_eq!(files["app.tf"].resources.len(), 1);
        assert_eq!(files["root.tf"].resources.len(), 1);
    }

    #[test]
    fn lifecycle_block_follows_fields() {
        let g = Generator::new();
        let r = g.create_resource(
            "aws_instance",
            "web",
            vec![
                attribute("ami", "ami-123"),
                attribute("instance_type", "t2.micro"),
            ],
        );
        g.ignore_changes(&r, "ami");

        let generated = g.generated.borrow();
        let text = generate(&vec![resource_config(&generated.resources[0])]);
        assert!(text.starts_with("resource \"aws_instance\" \"web\" {\n"));
        assert!(text.contains("ami = \"ami-123\"\n"));
        assert!(text.contains("instance_type = \"t2.micro\"\n"));
        let lifecycle = text.find("lifecycle {").expect("lifecycle block");
        assert!(lifecycle > text.find("instance_type").unwrap());
        assert!(text.contains("ignore_changes = [\n      ami\n    ]\n"));
        assert!(!text.contains("depends_on"));
        assert!(!text.contains("provisioner"));
        assert!(!text.contains("create_before_destroy"));
    }

    #[test]
    fn lifecycle_block_omitted_when_empty() {
        let g = Generator::new();
        g.create_resource("aws_instance", "web", vec![attribute("ami", "ami-123")]);
        let generated = g.generated.borrow();
        let text = generate(&vec![resource_config(&generated.resources[0])]);
        assert!(!text.contains("lifecycle"));
    }

    #[test]
    fn depends_on_emits_unquoted_tokens() {
        let g = Generator::new();
        let a = g.create_resource("aws_instance", "web", vec![]);
        let b = g.local_name_scope("net").create_resource("aws_vpc", "main", vec![]);
        g.depends_on(&a, &b);

        let generated = g.generated.borrow();
        let text = generate(&vec![resource_config(&generated.resources[0])]);
        assert!(text.contains("depends_on = [\n    aws_vpc.net_main\n  ]\n"));
    }

    #[test]
    fn provisioner_emits_heredoc_command() {
        let g = Generator::new();
        let r = g.create_resource("aws_instance", "web", vec![]);
        g.local_exec_provisioner(&r, "echo setup\necho done");

        let generated = g.generated.borrow();
        let text = generate(&vec![resource_config(&generated.resources[0])]);
        assert!(text.contains("provisioner \"local-exec\" {\n"));
        assert!(text.contains("command = <<EOF\necho setup\necho done\nEOF\n"));
    }

    #[test]
    fn aliased_resource_gets_provider_attribute() {
        let g = Generator::new().provider_alias("aws", "east");
        g.create_resource("aws_instance", "web", vec![]);
        let generated = g.generated.borrow();
        let text = generate(&vec![resource_config(&generated.resources[0])]);
        assert!(text.contains("provider = aws.east\n"));
    }

    #[test]
    fn data_source_block_uses_data_keyword() {
        let g = Generator::new().local_name_scope("net");
        g.create_data_source("aws_ami", "ubuntu", vec![attribute("most_recent", true)]);
        let generated = g.generated.borrow();
        let text = generate(&vec![data_source_config(&generated.datasources[0])]);
        assert_eq!(
            text,
            "data \"aws_ami\" \"net_ubuntu\" {\n  most_recent = true\n}\n"
        );
    }

    #[test]
    fn output_block_renders_reference_value() {
        let g = Generator::new();
        g.create_output("instance_ip", "${aws_instance.web.public_ip}");
        let generated = g.generated.borrow();
        let text = generate(&vec![output_config(&generated.outputs[0])]);
        assert_eq!(
            text,
            "output \"instance_ip\" {\n  value = aws_instance.web.public_ip\n}\n"
        );
    }

    #[test]
    fn file_sections_are_ordered() {
        let g = Generator::new().local_name_scope("net");
        g.create_resource("aws_vpc", "main", vec![]);
        g.create_data_source("aws_ami", "ubuntu", vec![]);
        g.create_output("vpc_id", "${aws_vpc.net_main.id}");

        let generated = g.generated.borrow();
        let files = group_resources(&generated);
        let text = generate(&file_config(&files["net.tf"]));

        let data = text.find("data \"aws_ami\"").unwrap();
        let resource = text.find("resource \"aws_vpc\"").unwrap();
        let output = text.find("output \"net_vpc_id\"").unwrap();
        assert!(data < resource && resource < output);
        assert!(text.starts_with("// Generated by tfgen."));
    }
}
