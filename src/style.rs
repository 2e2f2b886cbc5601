pub mod color;
pub mod missed_tags;
pub mod resolver;
pub mod scheme;

/// Way/relation style categories. An entity is styled by the first category
/// in `CATEGORY_ORDER` whose key it carries, and only by that one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Natural,
    Landuse,
    Building,
    Amenity,
    Waterway,
    Railway,
    Highway,
    Leisure,
    Barrier,
    Border,
}

pub const CATEGORY_ORDER: [Category; 10] = [
    Category::Natural,
    Category::Landuse,
    Category::Building,
    Category::Amenity,
    Category::Waterway,
    Category::Railway,
    Category::Highway,
    Category::Leisure,
    Category::Barrier,
    Category::Border,
];

impl Category {
    pub fn key(&self) -> &'static str {
        match self {
            Category::Natural => "natural",
            Category::Landuse => "landuse",
            Category::Building => "building",
            Category::Amenity => "amenity",
            Category::Waterway => "waterway",
            Category::Railway => "railway",
            Category::Highway => "highway",
            Category::Leisure => "leisure",
            Category::Barrier => "barrier",
            Category::Border => "border",
        }
    }

    pub fn from_key(key: &str) -> Option<Category> {
        CATEGORY_ORDER.iter().copied().find(|category| category.key() == key)
    }
}
