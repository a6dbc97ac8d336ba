use meals_core::db::open_db_in_memory;
use meals_core::{
    CatalogService, CatalogServiceError, Ingredient, LabelFilter, Meal, MealKind, MealListQuery,
    MealValidationError, RecipeDraft, SqliteMealRepository,
};
use rusqlite::Connection;

fn catalog(conn: &Connection) -> CatalogService<SqliteMealRepository<'_>> {
    CatalogService::new(SqliteMealRepository::try_new(conn).unwrap())
}

fn names(meals: &[Meal]) -> Vec<&str> {
    meals.iter().map(|meal| meal.name.as_str()).collect()
}

const NO_LABELS: &[&str] = &[];

#[test]
fn add_meal_then_find_by_name_ignores_case() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);

    let created = catalog
        .add_meal(
            "Pasta Bake",
            MealKind::Recipe,
            &["time::quick", "carb::pasta"],
        )
        .unwrap();
    assert_eq!(created.name, "Pasta Bake");
    assert_eq!(created.kind, MealKind::Recipe);
    let labels: Vec<String> = created.labels.iter().map(ToString::to_string).collect();
    assert_eq!(labels, vec!["carb::pasta", "time::quick"]);

    let found = catalog.find_by_name("pasta bake").unwrap().unwrap();
    assert_eq!(found, created);
    assert_eq!(catalog.find_by_name("  PASTA BAKE ").unwrap(), Some(created));
    assert_eq!(catalog.find_by_name("Pasta").unwrap(), None);
}

#[test]
fn duplicate_name_in_any_case_is_rejected_and_catalog_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    let original = catalog
        .add_meal("Take Away", MealKind::Other, NO_LABELS)
        .unwrap();

    let err = catalog
        .add_meal("TAKE away", MealKind::Recipe, &["carb::rice"])
        .unwrap_err();
    assert!(matches!(err, CatalogServiceError::DuplicateName(_)));

    let all = catalog.list_meals(None).unwrap();
    assert_eq!(all, vec![original]);
    assert!(catalog.list_labels().unwrap().is_empty());
}

#[test]
fn malformed_label_is_rejected_before_anything_is_written() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);

    let err = catalog
        .add_meal("Curry", MealKind::Recipe, &["meat::chicken", "spicy"])
        .unwrap_err();
    match err {
        CatalogServiceError::InvalidLabel(label_err) => assert_eq!(label_err.input, "spicy"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(catalog.list_meals(None).unwrap().is_empty());
}

#[test]
fn blank_name_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);

    let err = catalog
        .add_meal("   ", MealKind::Other, NO_LABELS)
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogServiceError::InvalidMeal(MealValidationError::EmptyName)
    ));
}

#[test]
fn list_meals_without_filter_keeps_insertion_order() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    for name in ["Stir Fry", "Apple Pie", "Moussaka"] {
        catalog.add_meal(name, MealKind::Recipe, NO_LABELS).unwrap();
    }

    let all = catalog.list_meals(None).unwrap();
    assert_eq!(names(&all), vec!["Stir Fry", "Apple Pie", "Moussaka"]);
}

#[test]
fn list_meals_filters_by_exact_label_and_category_wildcard() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    catalog
        .add_meal("Pasta Bake", MealKind::Recipe, &["carb::pasta", "time::quick"])
        .unwrap();
    catalog
        .add_meal("Risotto", MealKind::Recipe, &["carb::rice"])
        .unwrap();
    catalog
        .add_meal("Roast Chicken", MealKind::Recipe, &["meat::chicken"])
        .unwrap();
    catalog
        .add_meal("Take Away", MealKind::Other, NO_LABELS)
        .unwrap();

    let pasta = catalog.list_meals_matching(&["carb::pasta"]).unwrap();
    assert_eq!(names(&pasta), vec!["Pasta Bake"]);

    let any_carb = catalog.list_meals_matching(&["carb::*"]).unwrap();
    assert_eq!(names(&any_carb), vec!["Pasta Bake", "Risotto"]);

    let quick_carb = LabelFilter::parse(&["carb::*", "time::quick"]).unwrap();
    let quick = catalog.list_meals(Some(&quick_carb)).unwrap();
    assert_eq!(names(&quick), vec!["Pasta Bake"]);

    let none = catalog
        .list_meals_matching(&["carb::*", "meat::*"])
        .unwrap();
    assert!(none.is_empty());

    let empty_filter = catalog.list_meals(Some(&LabelFilter::all())).unwrap();
    assert_eq!(empty_filter.len(), 4);
}

#[test]
fn label_filters_are_case_sensitive() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    catalog
        .add_meal("Pasta Bake", MealKind::Recipe, &["carb::pasta"])
        .unwrap();

    assert!(catalog
        .list_meals_matching(&["Carb::pasta"])
        .unwrap()
        .is_empty());
    assert!(matches!(
        catalog.list_meals_matching(&["carb"]).unwrap_err(),
        CatalogServiceError::InvalidLabel(_)
    ));
}

#[test]
fn search_by_prefix_is_case_insensitive_ordered_and_limited() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    for name in ["pasta Salad", "Pasta Bake", "Paella", "Soup", "Pastéis"] {
        catalog.add_meal(name, MealKind::Recipe, NO_LABELS).unwrap();
    }

    let past = catalog.search_by_prefix("PAST", None).unwrap();
    assert_eq!(names(&past), vec!["Pasta Bake", "pasta Salad", "Pastéis"]);

    let limited = catalog.search_by_prefix("pa", Some(2)).unwrap();
    assert_eq!(names(&limited), vec!["Paella", "Pasta Bake"]);

    assert!(catalog.search_by_prefix("x", None).unwrap().is_empty());
    assert_eq!(catalog.search_by_prefix("", None).unwrap().len(), 5);
}

#[test]
fn search_by_prefix_treats_like_wildcards_literally() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    catalog
        .add_meal("100% Beef Burger", MealKind::Recipe, NO_LABELS)
        .unwrap();
    catalog
        .add_meal("1000 Island Salad", MealKind::Recipe, NO_LABELS)
        .unwrap();

    let hits = catalog.search_by_prefix("100%", None).unwrap();
    assert_eq!(names(&hits), vec!["100% Beef Burger"]);
}

#[test]
fn add_recipe_persists_instructions_and_ordered_ingredients() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);

    let draft = RecipeDraft {
        name: "Carrot Surprise".to_string(),
        instructions: "Peel, chop, roast.".to_string(),
        ingredients: vec![
            Ingredient::parse("Carrot 10 units").unwrap(),
            Ingredient::new("Olive oil", 2.0, "tbsp"),
        ],
        labels: vec!["veg::carrot".to_string()],
    };
    let created = catalog.add_recipe(&draft).unwrap();

    let loaded = catalog.get_meal(created.id).unwrap().unwrap();
    assert_eq!(loaded.instructions, "Peel, chop, roast.");
    assert_eq!(
        loaded.ingredients,
        vec![
            Ingredient::new("Carrot", 10.0, "units"),
            Ingredient::new("Olive oil", 2.0, "tbsp"),
        ]
    );
    assert_eq!(loaded.labels[0].to_string(), "veg::carrot");
}

#[test]
fn ingredients_are_shared_between_recipes() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);

    for name in ["Carrot Soup", "Carrot Cake"] {
        catalog
            .add_recipe(&RecipeDraft {
                name: name.to_string(),
                ingredients: vec![Ingredient::new("Carrot", 3.0, "units")],
                ..RecipeDraft::default()
            })
            .unwrap();
    }

    let ingredient_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM ingredients;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(ingredient_rows, 1);
}

#[test]
fn update_meal_replaces_detail_and_labels() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    let created = catalog
        .add_recipe(&RecipeDraft {
            name: "Chilli".to_string(),
            instructions: "Simmer".to_string(),
            ingredients: vec![
                Ingredient::new("Beans", 1.0, "tin"),
                Ingredient::new("Mince", 500.0, "g"),
            ],
            labels: vec!["meat::beef".to_string()],
        })
        .unwrap();

    let updated = catalog
        .update_meal(
            created.id,
            &RecipeDraft {
                name: "Veggie Chilli".to_string(),
                instructions: "Simmer longer".to_string(),
                ingredients: vec![Ingredient::new("Beans", 2.0, "tin")],
                labels: vec!["meat::none".to_string(), "time::slow".to_string()],
            },
        )
        .unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.kind, MealKind::Recipe);
    assert_eq!(updated.name, "Veggie Chilli");
    assert_eq!(updated.ingredients, vec![Ingredient::new("Beans", 2.0, "tin")]);
    assert_eq!(updated.labels.len(), 2);
    assert_eq!(catalog.find_by_name("chilli").unwrap(), None);
}

#[test]
fn update_meal_rejects_name_of_another_meal_and_missing_ids() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    let first = catalog
        .add_meal("Fish Pie", MealKind::Recipe, NO_LABELS)
        .unwrap();
    catalog
        .add_meal("Lasagne", MealKind::Recipe, NO_LABELS)
        .unwrap();

    let rename = RecipeDraft {
        name: "LASAGNE".to_string(),
        ..RecipeDraft::default()
    };
    assert!(matches!(
        catalog.update_meal(first.id, &rename).unwrap_err(),
        CatalogServiceError::DuplicateName(_)
    ));

    let same_name_new_case = RecipeDraft {
        name: "fish pie".to_string(),
        ..RecipeDraft::default()
    };
    assert_eq!(
        catalog
            .update_meal(first.id, &same_name_new_case)
            .unwrap()
            .name,
        "fish pie"
    );

    let missing = Meal::new(MealKind::Recipe, "Ghost").id;
    assert!(matches!(
        catalog.update_meal(missing, &rename).unwrap_err(),
        CatalogServiceError::MealNotFound(id) if id == missing
    ));
}

#[test]
fn other_meals_cannot_carry_recipe_detail() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    let takeaway = catalog
        .add_meal("Take Away", MealKind::Other, NO_LABELS)
        .unwrap();

    let err = catalog
        .update_meal(
            takeaway.id,
            &RecipeDraft {
                name: "Take Away".to_string(),
                instructions: "Call the shop".to_string(),
                ..RecipeDraft::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogServiceError::InvalidMeal(MealValidationError::DetailOnOtherMeal)
    ));
}

#[test]
fn set_labels_replaces_full_set() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    let meal = catalog
        .add_meal("Ramen", MealKind::Recipe, &["carb::noodles", "time::slow"])
        .unwrap();

    let relabelled = catalog.set_labels(meal.id, &["time::quick"]).unwrap();
    let labels: Vec<String> = relabelled.labels.iter().map(ToString::to_string).collect();
    assert_eq!(labels, vec!["time::quick"]);

    let listed: Vec<String> = catalog
        .list_labels()
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(listed, vec!["time::quick"]);
}

#[test]
fn require_by_name_reports_not_found() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);

    let err = catalog.require_by_name(" Nothing ").unwrap_err();
    assert!(matches!(err, CatalogServiceError::NameNotFound(name) if name == "Nothing"));
}

#[test]
fn delete_meal_removes_unplanned_meal_and_its_links() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    let meal = catalog
        .add_recipe(&RecipeDraft {
            name: "Omelette".to_string(),
            ingredients: vec![Ingredient::new("Egg", 3.0, "units")],
            labels: vec!["time::quick".to_string()],
            ..RecipeDraft::default()
        })
        .unwrap();

    catalog.delete_meal(meal.id).unwrap();
    assert_eq!(catalog.get_meal(meal.id).unwrap(), None);
    assert!(catalog.list_labels().unwrap().is_empty());

    assert!(matches!(
        catalog.delete_meal(meal.id).unwrap_err(),
        CatalogServiceError::MealNotFound(_)
    ));
}

#[test]
fn meal_serializes_kind_and_labels_as_strings() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    let meal = catalog
        .add_meal("Pasta Bake", MealKind::Recipe, &["carb::pasta"])
        .unwrap();

    let json = serde_json::to_value(&meal).unwrap();
    assert_eq!(json["kind"], "recipe");
    assert_eq!(json["labels"][0], "carb::pasta");

    let back: Meal = serde_json::from_value(json).unwrap();
    assert_eq!(back, meal);
}

#[test]
fn ingredient_filter_keeps_only_meals_with_ingredients() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn);
    catalog
        .add_recipe(&RecipeDraft {
            name: "Carrot Soup".to_string(),
            ingredients: vec![Ingredient::new("Carrot", 4.0, "units")],
            labels: vec!["diet::veggie".to_string()],
            ..RecipeDraft::default()
        })
        .unwrap();
    catalog
        .add_meal("Toast", MealKind::Recipe, &["diet::veggie"])
        .unwrap();
    catalog
        .add_recipe(&RecipeDraft {
            name: "Chilli".to_string(),
            ingredients: vec![Ingredient::new("Beans", 1.0, "tin")],
            ..RecipeDraft::default()
        })
        .unwrap();
    catalog.add_meal("Take Away", MealKind::Other, NO_LABELS).unwrap();

    let stocked = catalog
        .query_meals(&MealListQuery {
            with_ingredients_only: true,
            ..MealListQuery::default()
        })
        .unwrap();
    assert_eq!(names(&stocked), vec!["Carrot Soup", "Chilli"]);

    let veggie_stocked = catalog
        .query_meals(&MealListQuery {
            labels: LabelFilter::parse(&["diet::veggie"]).unwrap(),
            with_ingredients_only: true,
        })
        .unwrap();
    assert_eq!(names(&veggie_stocked), vec!["Carrot Soup"]);

    let everything = catalog.query_meals(&MealListQuery::default()).unwrap();
    assert_eq!(everything.len(), 4);
}
