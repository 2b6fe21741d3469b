use std::fmt::{self, Write};

use crate::config::CoordinatorConfig;
use crate::models::{
    CoreError, CoreErrorKind, Lodging, PointOfInterest, Section, TransitRoute, TravelPlan,
};

const STILL_WORKING: &str =
    "I'm still working on your request and will follow up with full recommendations shortly.";
const MORE_DETAIL_COMING: &str = "_I'm preparing more detailed information, please hold on..._";
const DEGRADED_NOTE: &str =
    "_The live search ran out of time, so these results are approximate._";

const GENERAL_TRANSIT_ADVICE: &[&str] = &[
    "From the airport, taxis, airport buses and the airport metro line all reach the city centre.",
    "Within the city, the metro, buses and rental bikes cover most sights.",
    "For sights outside the city, consider renting a car or joining a day tour.",
];

const TRAVEL_TIPS: &[&str] = &[
    "Check the weather forecast before you set out and pack accordingly.",
    "Book tickets for popular sights in advance to skip the queues.",
    "Respect local customs; some religious sites have a dress code.",
    "Carry enough water and sun protection.",
];

pub fn acknowledgement(destination: Option<&str>) -> String {
    match destination {
        Some(destination) => format!(
            "Thanks! I'm looking up places to stay and things to do in {destination}. \
             A first overview will follow in a moment."
        ),
        None => "Thanks! I'm looking into your trip. A first overview will follow in a moment."
            .to_string(),
    }
}

/// Asked when the query names nothing the coordinator can look up.
pub fn clarification() -> String {
    "I'd love to help plan your trip. Could you tell me where you're going, and whether you \
     need a place to stay, sights to visit or help getting around?"
        .to_string()
}

pub fn total_failure() -> String {
    "Sorry, I couldn't find any travel information matching your request. Could you share more \
     detail, such as your destination, budget or travel interests?"
        .to_string()
}

pub fn coordination_failure() -> String {
    "## Sorry, something went wrong while preparing your plan\n\n\
     Please try describing your trip again, or add a little more detail so I can help."
        .to_string()
}

/// Preview built from phase-one results. Never empty.
pub fn quick_response(plan: &TravelPlan, config: &CoordinatorConfig) -> Result<String, CoreError> {
    if !plan.has_core_results() {
        return Ok(STILL_WORKING.to_string());
    }
    render(|out| {
        writeln!(out, "# First travel suggestions")?;
        writeln!(out)?;

        if plan.lodging.has_items() {
            writeln!(out, "## Places to stay")?;
            for (index, lodging) in plan
                .lodging
                .items()
                .iter()
                .take(config.max_listed_lodging)
                .enumerate()
            {
                write_lodging_summary(out, index + 1, lodging)?;
            }
            degraded_note(out, &plan.lodging)?;
        }

        if plan.points_of_interest.has_items() {
            writeln!(out, "## Sights preview")?;
            for (index, poi) in plan
                .points_of_interest
                .items()
                .iter()
                .take(config.max_listed_points_of_interest)
                .enumerate()
            {
                writeln!(out, "### {}. {}", index + 1, poi.name)?;
                writeln!(out, "* **Type**: {}", poi.kind)?;
                writeln!(out, "* **About**: {}", poi.description)?;
                writeln!(out)?;
            }
            degraded_note(out, &plan.points_of_interest)?;
        }

        write!(out, "{MORE_DETAIL_COMING}")
    })
}

/// Full answer. Sections always appear in the order lodging, sights, transit, tips.
pub fn complete_response(
    plan: &TravelPlan,
    config: &CoordinatorConfig,
) -> Result<String, CoreError> {
    render(|out| {
        match plan.destination.as_deref() {
            Some(destination) => writeln!(out, "# Your trip to {destination}")?,
            None => writeln!(out, "# Your travel plan")?,
        }
        writeln!(out)?;

        if !matches!(plan.lodging, Section::NotRequested) {
            writeln!(out, "## Recommended places to stay")?;
            if plan.lodging.has_items() {
                for (index, lodging) in plan
                    .lodging
                    .items()
                    .iter()
                    .take(config.max_listed_lodging)
                    .enumerate()
                {
                    write_lodging_detail(out, index + 1, lodging)?;
                }
                degraded_note(out, &plan.lodging)?;
            } else {
                writeln!(out, "{}", section_apology(&plan.lodging, "places to stay"))?;
                writeln!(out)?;
            }
        }

        if !matches!(plan.points_of_interest, Section::NotRequested) {
            writeln!(out, "## Recommended sights and activities")?;
            if plan.points_of_interest.has_items() {
                for (index, poi) in plan
                    .points_of_interest
                    .items()
                    .iter()
                    .take(config.max_listed_points_of_interest)
                    .enumerate()
                {
                    write_point_of_interest_detail(out, index + 1, poi)?;
                }
                degraded_note(out, &plan.points_of_interest)?;
            } else {
                writeln!(
                    out,
                    "{}",
                    section_apology(&plan.points_of_interest, "sights and activities")
                )?;
                writeln!(out)?;
            }
        }

        writeln!(out, "## Getting around")?;
        if plan.transit.has_items() {
            for route in plan.transit.items() {
                write_route(out, route)?;
            }
        } else {
            if !matches!(plan.transit, Section::NotRequested) {
                writeln!(out, "{}", section_apology(&plan.transit, "transit suggestions"))?;
                writeln!(out)?;
            }
            writeln!(out, "### General advice")?;
            for advice in GENERAL_TRANSIT_ADVICE {
                writeln!(out, "* {advice}")?;
            }
        }
        writeln!(out)?;

        writeln!(out, "## Travel tips")?;
        for tip in TRAVEL_TIPS {
            writeln!(out, "* {tip}")?;
        }
        Ok(())
    })
}

/// Explains why a section has nothing to show.
pub fn section_apology<T>(section: &Section<T>, subject: &str) -> String {
    match section {
        Section::Ready(_) | Section::Degraded(_) | Section::Empty => format!(
            "Sorry, I couldn't find any {subject} matching your request. A wider budget or a \
             nearby destination may help."
        ),
        Section::Failed => format!(
            "Sorry, the search for {subject} ran into a problem, so I can't recommend any right now."
        ),
        Section::TimedOut => format!(
            "Sorry, the search for {subject} took too long, so I can't show any results this time."
        ),
        Section::Cancelled => {
            format!("Sorry, the search for {subject} was stopped before it could finish.")
        }
        Section::Skipped => format!(
            "Sorry, {subject} need both a place to stay and sights to visit, so I couldn't work \
             them out this time."
        ),
        Section::NotRequested => format!("You didn't ask for {subject}."),
    }
}

fn render<F>(body: F) -> Result<String, CoreError>
where
    F: FnOnce(&mut String) -> fmt::Result,
{
    let mut out = String::new();
    body(&mut out).map_err(|_| {
        CoreError::new(CoreErrorKind::Coordination, "failed to render response text")
    })?;
    if out.trim().is_empty() {
        return Err(CoreError::new(
            CoreErrorKind::Coordination,
            "rendered response text is empty",
        ));
    }
    Ok(out)
}

fn degraded_note<T>(out: &mut String, section: &Section<T>) -> fmt::Result {
    if section.is_degraded() {
        writeln!(out, "{DEGRADED_NOTE}")?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_lodging_summary(out: &mut String, position: usize, lodging: &Lodging) -> fmt::Result {
    writeln!(out, "### {position}. {}", lodging.name)?;
    writeln!(out, "* **Rating**: {:.1} stars", lodging.rating)?;
    writeln!(
        out,
        "* **Price**: NT${}-{} per night",
        lodging.price_range.min, lodging.price_range.max
    )?;
    writeln!(out, "* **Location**: {}", lodging.location)?;
    writeln!(out)
}

fn write_lodging_detail(out: &mut String, position: usize, lodging: &Lodging) -> fmt::Result {
    writeln!(out, "### {position}. {}", lodging.name)?;
    writeln!(out, "* **Rating**: {:.1} stars", lodging.rating)?;
    writeln!(
        out,
        "* **Price**: NT${}-{} per night",
        lodging.price_range.min, lodging.price_range.max
    )?;
    writeln!(out, "* **Location**: {}", lodging.location)?;
    if !lodging.amenities.is_empty() {
        let amenities: Vec<&str> = lodging.amenities.iter().take(5).map(String::as_str).collect();
        writeln!(out, "* **Amenities**: {}", amenities.join(", "))?;
    }
    if let Some(description) = &lodging.description {
        writeln!(out, "* **About**: {description}")?;
    }
    writeln!(out)
}

fn write_point_of_interest_detail(
    out: &mut String,
    position: usize,
    poi: &PointOfInterest,
) -> fmt::Result {
    writeln!(out, "### {position}. {}", poi.name)?;
    writeln!(out, "* **Type**: {}", poi.kind)?;
    writeln!(out, "* **Location**: {}", poi.location)?;
    writeln!(out, "* **About**: {}", poi.description)?;
    if let Some(best_time) = &poi.best_time {
        writeln!(out, "* **Best time to visit**: {best_time}")?;
    }
    if let Some(tips) = &poi.tips {
        writeln!(out, "* **Tip**: {tips}")?;
    }
    writeln!(out)
}

fn write_route(out: &mut String, route: &TransitRoute) -> fmt::Result {
    writeln!(out, "### {} to {}", route.origin, route.destination)?;
    for (index, option) in route.options.iter().enumerate() {
        writeln!(out, "{}. **{}**: {}", index + 1, option.method, option.description)?;
    }
    writeln!(out)
}
