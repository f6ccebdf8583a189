use uuid::Uuid;

use crate::models::{ProductRow, now_timestamp};

const SAMPLES: &[(&str, &str, f64, &str, &str, i64)] = &[
    (
        "Classic White T-Shirt",
        "Premium cotton t-shirt with a comfortable fit",
        29.99,
        "T-Shirts",
        "https://images.unsplash.com/photo-1521572163474-6864f9cf17ab?w=500",
        50,
    ),
    (
        "Denim Jeans",
        "High-quality denim jeans with perfect fit",
        79.99,
        "Jeans",
        "https://images.unsplash.com/photo-1542272604-787c3835535d?w=500",
        30,
    ),
    (
        "Casual Hoodie",
        "Warm and comfortable hoodie for everyday wear",
        59.99,
        "Hoodies",
        "https://images.unsplash.com/photo-1556821840-3a63f95609a7?w=500",
        25,
    ),
    (
        "Formal Shirt",
        "Elegant formal shirt for professional occasions",
        89.99,
        "Shirts",
        "https://images.unsplash.com/photo-1596755094514-f87e34085b2c?w=500",
        20,
    ),
    (
        "Summer Dress",
        "Beautiful summer dress with floral pattern",
        69.99,
        "Dresses",
        "https://images.unsplash.com/photo-1515372039744-b8f02a3ae446?w=500",
        15,
    ),
    (
        "Sneakers",
        "Comfortable sneakers for daily use",
        99.99,
        "Shoes",
        "https://images.unsplash.com/photo-1549298916-b41d501d3772?w=500",
        40,
    ),
];

/// The starter catalogue: unowned products with fresh ids.
pub fn sample_products() -> Vec<ProductRow> {
    SAMPLES
        .iter()
        .map(|&(name, description, price, category, image, stock)| ProductRow {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            price,
            category: category.to_string(),
            image: image.to_string(),
            stock,
            sizes: Vec::new(),
            colors: Vec::new(),
            vendor_id: None,
            vendor_name: None,
            created_at: now_timestamp(),
        })
        .collect()
}
