use std::collections::HashMap;

use shared::{
    domain::{AgeCategoryId, DocumentId, ProcessId, RegionId},
    error::{ApiError, ErrorCode},
    protocol::{RequirementItem, RequirementUpsertRequest},
};
use tracing::info;

use crate::{reconcile_requirements, store_error, ApiContext};

const REGIONS: &[&str] = &["Kerala", "Karnataka", "Maharashtra", "Tamil Nadu", "Delhi"];

const AGE_CATEGORIES: &[(&str, i32, i32)] = &[
    ("Minor", 0, 17),
    ("Adult", 18, 59),
    ("Senior Citizen", 60, 120),
];

const PROCESSES: &[(&str, &str)] = &[
    (
        "Driving License Application",
        "Apply for a new Learner's or Driving License",
    ),
    ("Passport Application", "Apply for a new Fresh Passport"),
    ("Voter ID Registration", "Enroll in the electoral roll"),
    (
        "Ration Card Application",
        "Apply for a new family ration card",
    ),
];

const DOCUMENTS: &[(&str, &str)] = &[
    ("Adhaar Card", "Original and Copy"),
    ("Birth Certificate", "Issued by Municipality/Panchayat"),
    ("SSLC Certificate", "10th Standard Marksheet"),
    ("School ID Card", "Valid ID from recognized institution"),
    (
        "Passport Size Photo",
        "Recent color photograph with white background",
    ),
    ("Bank Passbook", "Front page with account details"),
    ("Electricity Bill", "Recent bill (not older than 3 months)"),
    ("Rental Agreement", "Registered rental agreement"),
    ("Pan Card", "For identity proof"),
];

struct SeedScope {
    process: &'static str,
    age_category: &'static str,
    region: Option<&'static str>,
    items: &'static [(&'static str, i32, &'static str)],
}

const SCOPES: &[SeedScope] = &[
    SeedScope {
        process: "Driving License Application",
        age_category: "Minor",
        region: Some("Kerala"),
        items: &[
            ("Birth Certificate", 1, "Proof of Date of Birth"),
            ("Adhaar Card", 2, "Proof of Identity"),
            ("Passport Size Photo", 3, "2 Recent Photographs"),
        ],
    },
    SeedScope {
        process: "Driving License Application",
        age_category: "Adult",
        region: Some("Kerala"),
        items: &[
            ("SSLC Certificate", 1, "Proof of Age & Qualification"),
            ("Adhaar Card", 2, "Proof of Address & Identity"),
        ],
    },
    SeedScope {
        process: "Passport Application",
        age_category: "Minor",
        region: None,
        items: &[
            ("Birth Certificate", 1, "Proof of Birth"),
            ("Adhaar Card", 2, "Proof of Identity"),
        ],
    },
    SeedScope {
        process: "Passport Application",
        age_category: "Adult",
        region: None,
        items: &[
            ("SSLC Certificate", 1, "ECNR Proof (Education)"),
            ("Adhaar Card", 2, "Address Proof"),
            ("Passport Size Photo", 3, "Photographs"),
        ],
    },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub seeded: bool,
    pub requirements: usize,
}

// No-op once any process exists, deleted ones included.
pub async fn seed_reference_data(ctx: &ApiContext) -> Result<SeedReport, ApiError> {
    let existing = ctx.storage.count_processes().await.map_err(store_error)?;
    if existing > 0 {
        info!(existing, "reference data already present, skipping seed");
        return Ok(SeedReport::default());
    }

    let mut regions: HashMap<&str, RegionId> = HashMap::new();
    for name in REGIONS {
        let region = ctx
            .storage
            .create_region(name)
            .await
            .map_err(store_error)?;
        regions.insert(*name, region.region_id);
    }

    let mut age_categories: HashMap<&str, AgeCategoryId> = HashMap::new();
    for (name, min_age, max_age) in AGE_CATEGORIES {
        let category = ctx
            .storage
            .create_age_category(name, *min_age, *max_age)
            .await
            .map_err(store_error)?;
        age_categories.insert(*name, category.age_category_id);
    }

    let mut processes: HashMap<&str, ProcessId> = HashMap::new();
    for (name, description) in PROCESSES {
        let process = ctx
            .storage
            .create_process(name, Some(*description))
            .await
            .map_err(store_error)?;
        processes.insert(*name, process.process_id);
    }

    let mut documents: HashMap<&str, DocumentId> = HashMap::new();
    for (name, notes) in DOCUMENTS {
        let document = ctx
            .storage
            .create_document(name, Some(*notes))
            .await
            .map_err(store_error)?;
        documents.insert(*name, document.document_id);
    }

    let mut report = SeedReport {
        seeded: true,
        requirements: 0,
    };
    for seed in SCOPES {
        let items = seed
            .items
            .iter()
            .map(|(document, order, step)| {
                Ok(RequirementItem::new(
                    lookup(&documents, document)?,
                    *order,
                    Some(*step),
                ))
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        let summary = reconcile_requirements(
            ctx,
            &RequirementUpsertRequest {
                process_id: lookup(&processes, seed.process)?,
                age_category_id: lookup(&age_categories, seed.age_category)?,
                region_id: seed
                    .region
                    .map(|name| lookup(&regions, name))
                    .transpose()?,
                items,
            },
        )
        .await?;
        report.requirements += summary.inserted;
    }

    info!(requirements = report.requirements, "seeded reference data");
    Ok(report)
}

fn lookup<T: Copy>(ids: &HashMap<&str, T>, name: &str) -> Result<T, ApiError> {
    ids.get(name).copied().ok_or_else(|| {
        ApiError::new(
            ErrorCode::Internal,
            format!("seed data references unknown entry '{name}'"),
        )
    })
}
