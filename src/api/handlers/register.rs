use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::{
    api::{extract::ValidatedJson, middleware::auth::CurrentUser, state::AppState},
    domain::{PaymentStatus, Section},
    error::{AppError, Result},
    service::CheckoutOrder,
};

/// Sections may be submitted inline; anything omitted keeps its saved value.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub personal_info: Option<Value>,
    pub academic_info: Option<Value>,
    #[serde(alias = "footballInfo")]
    pub sports_info: Option<Value>,
    pub additional_info: Option<Value>,
    pub documents: Option<Value>,
}

impl RegisterRequest {
    fn into_sections(self) -> Vec<(Section, Value)> {
        [
            (Section::PersonalInfo, self.personal_info),
            (Section::AcademicInfo, self.academic_info),
            (Section::SportsInfo, self.sports_info),
            (Section::AdditionalInfo, self.additional_info),
            (Section::Documents, self.documents),
        ]
        .into_iter()
        .filter_map(|(section, data)| match data {
            None | Some(Value::Null) => None,
            Some(data) => Some((section, data)),
        })
        .collect()
    }
}

/// Final submission: re-checks completeness server-side and opens a gateway order.
pub async fn register(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<Json<CheckoutOrder>> {
    let services = &state.service_context;
    let user_id = current.user.id;

    if let Some(existing) = services.application_service.load(user_id).await? {
        if existing.payment_status == PaymentStatus::Completed {
            return Err(AppError::Conflict("Registration fee already paid".to_string()));
        }
    }

    services
        .application_service
        .save_sections(user_id, req.into_sections())
        .await?;

    let order = services.payment_service.create_order(user_id).await?;

    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_provided_sections_are_applied() {
        let req: RegisterRequest = serde_json::from_value(json!({
            "personalInfo": {"fullName": "Asha"},
            "footballInfo": {"sportType": "Football"},
            "documents": null
        }))
        .unwrap();

        let sections: Vec<Section> = req.into_sections().into_iter().map(|(s, _)| s).collect();
        assert_eq!(sections, vec![Section::PersonalInfo, Section::SportsInfo]);
    }
}
