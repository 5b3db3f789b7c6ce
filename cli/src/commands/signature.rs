use anyhow::Result;
use modeldeck_core::signature::{FieldSpec, TypeMapping};
use modeldeck_core::{ModelApi, ModelVersion};

pub async fn execute(api: &dyn ModelApi, model: &str, version: &ModelVersion) -> Result<()> {
    let (signature, mapping) = tokio::join!(api.signature(model, version), api.type_mapping());
    let signature = signature?;
    let mapping = mapping.unwrap_or_else(|e| {
        tracing::warn!("Failed to load type mapping: {}", e);
        TypeMapping::default()
    });

    println!("Signature of {} version {}\n", model, version);

    let spec = &signature.signature;
    print_section("Inputs", &spec.inputs, &mapping);
    print_section("Params", &spec.params, &mapping);
    print_section("Outputs", &spec.outputs, &mapping);

    Ok(())
}

fn print_section(title: &str, fields: &[FieldSpec], mapping: &TypeMapping) {
    if fields.is_empty() {
        return;
    }

    println!("{}:", title);
    for field in fields {
        let info = mapping.lookup(field.field_type.as_str());
        println!(
            "  {:<28} {:<10} e.g. {}",
            field.name,
            field.field_type.as_str(),
            info.example_text()
        );
        println!("  {:<28} {}", "", mapping.describe(field));
    }
    println!();
}
