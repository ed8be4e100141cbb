//! Sample leafy-vegetable garden loaded when no saved data exists.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::{Collection, Store};
use crate::models::{
    Climate, Garden, GardenLocation, GardenSize, GardenType, GrowthStage, HealthStatus, Layout,
    Plant, PlantLocation, SoilType, Stage, Sunlight, Versions, WateringFrequency,
};

/// (description, days ago, notes) for each stage; `None` days means not reached.
type StageNote = (&'static str, Option<i64>, Option<&'static str>);

struct SamplePlant {
    name: &'static str,
    species: &'static str,
    description: &'static str,
    sunlight: Sunlight,
    location: PlantLocation,
    health: HealthStatus,
    care_notes: &'static str,
    current: Stage,
    stages: [StageNote; 4],
    planted_days_ago: i64,
    harvest_in_days: Option<i64>,
}

fn days(now: DateTime<Utc>, offset: i64) -> DateTime<Utc> {
    now + Duration::days(offset)
}

fn versions(now: DateTime<Utc>, stages: &[StageNote; 4]) -> Versions {
    let build = |stage: Stage| {
        let (description, ago, notes) = stages[stage.index()];
        GrowthStage {
            description: description.to_owned(),
            date: ago.map(|d| days(now, -d)),
            notes: notes.map(str::to_owned),
            ..GrowthStage::blank(stage)
        }
    };
    Versions {
        v1: build(Stage::V1),
        v2: build(Stage::V2),
        v3: build(Stage::V3),
        v4: build(Stage::V4),
    }
}

fn sample_plants() -> Vec<SamplePlant> {
    vec![
        SamplePlant {
            name: "Spinach",
            species: "Spinacia oleracea",
            description: "Nutritious leafy green, rich in iron",
            sunlight: Sunlight::PartialSun,
            location: PlantLocation::Outdoor,
            health: HealthStatus::Excellent,
            care_notes: "Keep soil moist. Harvest outer leaves first.",
            current: Stage::V3,
            stages: [
                ("Soil prepared, ready for sowing", Some(30), Some("Added compost and prepared rows")),
                ("Seeds germinated, small sprouts visible", Some(20), Some("Germination successful, thin seedlings")),
                ("Medium sized leaves, growing well", Some(10), Some("Healthy growth, regular watering")),
                ("Fully grown, ready for harvest", None, None),
            ],
            planted_days_ago: 30,
            harvest_in_days: Some(15),
        },
        SamplePlant {
            name: "Lettuce",
            species: "Lactuca sativa",
            description: "Crisp salad green, fast growing",
            sunlight: Sunlight::PartialSun,
            location: PlantLocation::Outdoor,
            health: HealthStatus::Good,
            care_notes: "Keep cool, water regularly",
            current: Stage::V2,
            stages: [
                ("Soil prepared for planting", Some(14), Some("Soil enriched with organic matter")),
                ("Small sprouts emerging", Some(7), Some("Healthy sprouts, good germination rate")),
                ("Medium growth", None, None),
                ("Fully grown", None, None),
            ],
            planted_days_ago: 14,
            harvest_in_days: Some(21),
        },
        SamplePlant {
            name: "Coriander",
            species: "Coriandrum sativum",
            description: "Aromatic herb for cooking",
            sunlight: Sunlight::PartialShade,
            location: PlantLocation::Indoor,
            health: HealthStatus::Excellent,
            care_notes: "Keep soil consistently moist",
            current: Stage::V4,
            stages: [
                ("Container prepared", Some(45), Some("Used potting mix")),
                ("Seeds sprouting", Some(35), Some("Good germination")),
                ("Leaves developing", Some(20), Some("Thinned and growing well")),
                ("Full size, harvesting regularly", Some(5), Some("Harvesting leaves as needed")),
            ],
            planted_days_ago: 45,
            harvest_in_days: Some(-5),
        },
        SamplePlant {
            name: "Mint",
            species: "Mentha",
            description: "Refreshing herb, grows vigorously",
            sunlight: Sunlight::PartialShade,
            location: PlantLocation::Indoor,
            health: HealthStatus::Excellent,
            care_notes: "Keep contained, spreads quickly",
            current: Stage::V4,
            stages: [
                ("Container ready", Some(60), Some("Potted cutting")),
                ("New growth", Some(50), Some("Roots established")),
                ("Spreading", Some(30), Some("Growing vigorously")),
                ("Fully established", Some(10), Some("Regular harvesting")),
            ],
            planted_days_ago: 60,
            harvest_in_days: None,
        },
        SamplePlant {
            name: "Methi (Fenugreek)",
            species: "Trigonella foenum-graecum",
            description: "Popular Indian leafy vegetable",
            sunlight: Sunlight::FullSun,
            location: PlantLocation::Outdoor,
            health: HealthStatus::Good,
            care_notes: "Fast growing, harvest in 3-4 weeks",
            current: Stage::V1,
            stages: [
                ("Ready for sowing", Some(0), Some("Soil prepared today")),
                ("Awaiting germination", None, None),
                ("Not yet", None, None),
                ("Not yet", None, None),
            ],
            planted_days_ago: 0,
            harvest_in_days: Some(25),
        },
        SamplePlant {
            name: "Palak (Indian Spinach)",
            species: "Beta vulgaris",
            description: "Popular leafy green for Indian dishes",
            sunlight: Sunlight::PartialSun,
            location: PlantLocation::Outdoor,
            health: HealthStatus::Excellent,
            care_notes: "Multiple harvests possible",
            current: Stage::V2,
            stages: [
                ("Bed prepared", Some(10), Some("Added manure")),
                ("Seedlings emerging", Some(5), Some("Good germination")),
                ("Not yet", None, None),
                ("Not yet", None, None),
            ],
            planted_days_ago: 10,
            harvest_in_days: Some(20),
        },
    ]
}

fn layout(
    store: &mut Store,
    now: DateTime<Utc>,
    name: &str,
    description: &str,
    image: Option<&str>,
    size: &str,
    crop_type: &str,
) -> Layout {
    Layout {
        id: store.next_id(Collection::Layouts, now),
        name: name.to_owned(),
        description: Some(description.to_owned()),
        image: image.map(str::to_owned),
        size: Some(size.to_owned()),
        crop_type: Some(crop_type.to_owned()),
        position: store.layouts.len() as u32 + 1,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Replaces the store contents with the sample garden.
pub(super) fn load_sample_data(store: &mut Store, now: DateTime<Utc>) {
    store.layouts.clear();
    for (name, description, image, size, crop) in [
        ("Leafy Greens Bed A", "Main bed for spinach and lettuce", Some("/images/hero-image.jpg"), "large", "leafy-vegetables"),
        ("Herb Garden", "Coriander, mint, and other herbs", None, "medium", "herbs"),
        ("Microgreens Tray", "Fast growing microgreens", None, "small", "microgreens"),
    ] {
        let l = layout(store, now, name, description, image, size, crop);
        store.layouts.push(l);
    }

    let plants: Vec<Plant> = sample_plants()
        .into_iter()
        .map(|s| Plant {
            id: store.next_id(Collection::Plants, now),
            name: s.name.to_owned(),
            species: Some(s.species.to_owned()),
            description: Some(s.description.to_owned()),
            category: "leafy-vegetable".to_owned(),
            is_priority: true,
            watering_frequency: WateringFrequency::Daily,
            sunlight: s.sunlight,
            location: s.location,
            health_status: s.health,
            care_notes: Some(s.care_notes.to_owned()),
            photo: None,
            tags: Vec::new(),
            last_watered: None,
            next_watering: None,
            current_version: s.current,
            versions: versions(now, &s.stages),
            planted_date: Some(days(now, -s.planted_days_ago)),
            expected_harvest_date: s.harvest_in_days.map(|d| days(now, d)),
            created_at: now,
            updated_at: now,
        })
        .collect();
    store.plants = plants;

    let ids: Vec<String> = store.plants.iter().map(|p| p.id.clone()).collect();
    let kitchen = Garden {
        id: store.next_id(Collection::Gardens, now),
        name: "Kitchen Garden".to_owned(),
        description: Some("Daily use leafy vegetables".to_owned()),
        location: GardenLocation::Backyard,
        size: GardenSize::Medium,
        garden_type: GardenType::Vegetable,
        plants: vec![ids[0].clone(), ids[1].clone(), ids[4].clone(), ids[5].clone()],
        notes: None,
        is_active: true,
        climate: Climate::default(),
        soil_type: SoilType::default(),
        created_at: now,
        updated_at: now,
    };
    let herbs = Garden {
        id: store.next_id(Collection::Gardens, now),
        name: "Herb Corner".to_owned(),
        description: Some("Fresh herbs for cooking".to_owned()),
        location: GardenLocation::Indoor,
        size: GardenSize::Small,
        garden_type: GardenType::Herb,
        plants: vec![ids[2].clone(), ids[3].clone()],
        notes: None,
        is_active: true,
        climate: Climate::default(),
        soil_type: SoilType::default(),
        created_at: now,
        updated_at: now,
    };
    store.gardens = vec![kitchen, herbs];

    info!(
        plants = store.plants().len(),
        gardens = store.gardens().len(),
        layouts = store.layouts().len(),
        "in-memory store initialized with sample data"
    );
}
