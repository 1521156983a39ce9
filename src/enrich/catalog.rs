// src/enrich/catalog.rs
//! Usability sub-characteristics (ISO/IEC 25010:2023) with a short definition used
//! in prompts and a fixed requirement template used as the enrichment fallback.

pub struct CategoryInfo {
    pub label: &'static str,
    pub definition: &'static str,
    pub template: &'static str,
}

pub const CATEGORIES: &[CategoryInfo] = &[
    CategoryInfo {
        label: "Operabilidad",
        definition: "Facilidad con la que el usuario opera y controla el producto",
        template: "El sistema debe ofrecer controles simples y consistentes que permitan al usuario operar sus funciones principales con el menor número de pasos posible.",
    },
    CategoryInfo {
        label: "Aprendizabilidad",
        definition: "Grado en que el usuario aprende a usar el producto en un tiempo razonable",
        template: "El sistema debe permitir que un usuario nuevo aprenda a usar sus funciones principales sin asistencia externa, mediante flujos guiados y terminología familiar.",
    },
    CategoryInfo {
        label: "Involucración del usuario",
        definition: "Grado en que la interfaz resulta atractiva y motiva la interacción continuada",
        template: "El sistema debe presentar una interfaz visualmente agradable y coherente que motive al usuario a seguir interactuando con el producto.",
    },
    CategoryInfo {
        label: "Reconocibilidad de adecuación",
        definition: "Grado en que el usuario reconoce si el producto es adecuado para sus necesidades",
        template: "El sistema debe comunicar de forma clara sus funciones y su propósito para que el usuario pueda reconocer si satisface sus necesidades.",
    },
    CategoryInfo {
        label: "Protección frente a errores de usuario",
        definition: "Grado en que el producto evita que el usuario cometa errores y permite recuperarse de ellos",
        template: "El sistema debe prevenir errores del usuario mediante validaciones y confirmaciones, y permitir deshacer acciones destructivas.",
    },
    CategoryInfo {
        label: "Inclusividad",
        definition: "Grado en que el producto puede ser usado por personas con capacidades y características diversas",
        template: "El sistema debe ser utilizable por personas con capacidades diversas, ofreciendo ajustes de tamaño de texto, contraste y compatibilidad con lectores de pantalla.",
    },
    CategoryInfo {
        label: "Auto descriptividad",
        definition: "Grado en que el producto presenta la información necesaria para que su uso sea evidente",
        template: "El sistema debe mostrar mensajes, etiquetas e íconos autoexplicativos que indiquen claramente el estado y el efecto de cada acción.",
    },
    CategoryInfo {
        label: "Asistencia al usuario",
        definition: "Grado en que el producto ofrece ayuda y soporte cuando el usuario lo necesita",
        template: "El sistema debe proporcionar ayuda contextual y un canal de soporte accesible desde la aplicación para resolver las dudas del usuario.",
    },
];

pub const GENERIC_DEFINITION: &str = "Requisito de usabilidad";

pub const GENERIC_TEMPLATE: &str =
    "El sistema debe mejorar su usabilidad atendiendo la necesidad expresada por el usuario.";

pub fn lookup(label: &str) -> Option<&'static CategoryInfo> {
    let label = label.trim();
    CATEGORIES.iter().find(|c| c.label.eq_ignore_ascii_case(label))
}

pub fn definition_for(label: &str) -> &'static str {
    lookup(label).map(|c| c.definition).unwrap_or(GENERIC_DEFINITION)
}

/// Deterministic fallback description for a category.
pub fn template_for(label: &str) -> &'static str {
    lookup(label).map(|c| c.template).unwrap_or(GENERIC_TEMPLATE)
}
